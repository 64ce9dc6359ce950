//! Stamps the build date, time and profile into the crate.
//!
//! `SOURCE_DATE_EPOCH` pins the timestamp for reproducible builds. The
//! `SCRIPTRACE_BUILD_DATE` / `SCRIPTRACE_BUILD_TIME` variables override the
//! rendered strings outright.

use time::formatting::Formattable;
use time::macros::format_description;
use time::OffsetDateTime;

fn build_instant() -> OffsetDateTime {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|secs| secs.trim().parse::<i64>().ok())
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or_else(OffsetDateTime::now_utc)
}

/// Emit `key`, preferring an explicit override of the same name.
fn stamp<F: Formattable + ?Sized>(key: &str, at: OffsetDateTime, format: &F) {
    println!("cargo:rerun-if-env-changed={key}");
    let value = std::env::var(key)
        .ok()
        .or_else(|| at.format(format).ok())
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env={key}={value}");
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    let at = build_instant();
    stamp("SCRIPTRACE_BUILD_DATE", at, format_description!("[year]-[month]-[day]"));
    stamp("SCRIPTRACE_BUILD_TIME", at, format_description!("[hour]:[minute]:[second] UTC"));

    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=SCRIPTRACE_BUILD_PROFILE={profile}");
}
