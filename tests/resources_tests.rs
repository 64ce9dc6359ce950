//! Resource store shared between the control thread and pixel jobs.

use std::sync::Arc;
use std::thread;

use scriptrace::bvh::BvhOptions;
use scriptrace::geom::Model;
use scriptrace::jobs::{Batch, Scheduler};
use scriptrace::resources::{Image, Resources};
use scriptrace::script::NativeHost;
use scriptrace::util::{Error, Vec3};

#[test]
fn test_handles_are_object_ids() {
    let res = Resources::default();
    let img = Image::rgb(4, 4);
    let id = img.id();
    assert_eq!(res.add_image(img), id);

    let model = Model::quad(Vec3::ZERO, Vec3::ONE, -1);
    let model_id = model.id();
    assert_eq!(res.add_model(model), model_id);
    assert_ne!(id, model_id);

    assert_eq!(res.image_handles(), vec![id]);
    assert_eq!(res.model_handles(), vec![model_id]);
    assert!(res.remove_image(id));
    assert!(!res.remove_image(id));
}

#[test]
fn test_error_log_cap_under_contention() {
    let res = Arc::new(Resources::new(128));
    let threads: Vec<_> = (0..8)
        .map(|t| {
            let res = Arc::clone(&res);
            thread::spawn(move || {
                for i in 0..50 {
                    res.report_error(format!("thread {t} error {i}"));
                    res.report_error("");
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(res.num_errors(), 128);
    res.clear_errors();
    assert_eq!(res.num_errors(), 0);
}

#[test]
fn test_concurrent_bvh_builds() {
    let res = Arc::new(Resources::default());
    let model = res.add_model(Model::quad(Vec3::splat(-1.0), Vec3::ONE, -1));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let res = Arc::clone(&res);
            thread::spawn(move || res.make_bvh(model, BvhOptions::default()).unwrap())
        })
        .collect();
    let mut built: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    built.sort_unstable();
    built.dedup();

    assert_eq!(built.len(), 4);
    assert_eq!(res.bvh_handles(), built);
    assert_eq!(res.num_errors(), 0);
}

#[test]
fn test_batch_writes_image() {
    let host = NativeHost::new().shader("uv", |p, ctx| {
        let img = p
            .image
            .and_then(|h| ctx.resources().image(h))
            .ok_or_else(|| Error::script("no image"))?;
        img.set_color(p.x, p.y, Vec3::new(p.u, p.v, 1.0));
        Ok(())
    });

    let res = Arc::new(Resources::default());
    let image = res.add_image(Image::rgb(8, 4));
    let pool = Scheduler::with_workers(Arc::new(host), Arc::clone(&res), 3).unwrap();
    pool.submit_batch(Batch::from_code(8, 4, "uv").with_image(image).blocking(true)).unwrap();

    let img = res.image(image).unwrap();
    for y in 0..4 {
        for x in 0..8 {
            let expected = Vec3::new((x as f32 + 0.5) / 8.0, (y as f32 + 0.5) / 4.0, 1.0);
            assert_eq!(img.color(x, y), expected);
        }
    }
    assert_eq!(res.num_errors(), 0);
}

#[test]
fn test_batch_on_removed_image_reports() {
    let host = NativeHost::new().shader("uv", |p, ctx| {
        if let Some(img) = p.image.and_then(|h| ctx.resources().image(h)) {
            img.set_color(p.x, p.y, Vec3::ONE);
        }
        Ok(())
    });

    let res = Arc::new(Resources::new(4));
    let image = res.add_image(Image::rgb(3, 3));
    res.remove_image(image);

    let pool = Scheduler::with_workers(Arc::new(host), Arc::clone(&res), 2).unwrap();
    pool.submit_batch(Batch::from_code(3, 3, "uv").with_image(image)).unwrap();
    pool.wait_idle();

    // Nine misses, capped at four entries.
    assert_eq!(res.num_errors(), 4);
    assert_eq!(res.errors()[0], format!("Nonexistent image: {image}"));
}

#[test]
fn test_unknown_shader_reports() {
    let res = Arc::new(Resources::default());
    let pool = Scheduler::with_workers(Arc::new(NativeHost::new()), Arc::clone(&res), 2).unwrap();
    pool.submit_batch(Batch::from_code(2, 1, "missing")).unwrap();
    pool.wait_idle();

    let errors = res.errors();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].contains("unknown shader 'missing'"));
}
