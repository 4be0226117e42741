use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::Rgba;
use mdipaint::canvas::PixelSurface;
use mdipaint::error::TransformError;
use mdipaint::plugins::grayscale::Grayscale;
use mdipaint::plugins::median::MatrixMedian;
use mdipaint::plugins::{
    CancelToken, NoProgress, ProgressSink, Transform, TransformRequest, TransformRunner,
};

/// Deterministic, non-uniform test pattern.
fn pattern(w: u32, h: u32) -> PixelSurface {
    let mut s = PixelSurface::new(w, h).unwrap();
    for y in 0..h {
        for x in 0..w {
            let v = (x * 37 + y * 91) as u8;
            s.set(x, y, Rgba([v, v.wrapping_mul(3), 255 - v, 200])).unwrap();
        }
    }
    s
}

fn recorder() -> (Arc<Mutex<Vec<u8>>>, impl Fn(u8) + Send + Sync) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let seen = seen.clone();
        move |p: u8| seen.lock().unwrap().push(p)
    };
    (seen, sink)
}

fn assert_monotonic_to_100(seen: &[u8]) {
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {:?}", seen);
    assert_eq!(*seen.last().unwrap(), 100);
    assert!(seen.iter().all(|&p| p <= 100));
}

#[test]
fn progress_is_monotonic_and_ends_at_100() {
    let transforms: [&dyn Transform; 2] = [&Grayscale, &MatrixMedian];
    for transform in transforms {
        let (seen, sink) = recorder();
        let mut s = pattern(64, 37);
        TransformRunner::run(transform, &mut s, &sink, &CancelToken::new()).unwrap();
        assert_monotonic_to_100(&seen.lock().unwrap());
    }
}

#[test]
fn pre_cancelled_run_leaves_the_surface_identical() {
    let transforms: [&dyn Transform; 2] = [&Grayscale, &MatrixMedian];
    for transform in transforms {
        let mut s = pattern(32, 32);
        let before = s.clone();
        let cancel = CancelToken::new();
        cancel.cancel();
        let (seen, sink) = recorder();
        let err = TransformRunner::run(transform, &mut s, &sink, &cancel).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(s, before);
        assert!(seen.lock().unwrap().is_empty());
    }
}

#[test]
fn cancelling_mid_run_discards_every_row() {
    let mut s = pattern(50, 400);
    let before = s.clone();
    let cancel = CancelToken::new();
    let sink = {
        let cancel = cancel.clone();
        move |_p: u8| cancel.cancel()
    };
    let err = TransformRunner::run(&MatrixMedian, &mut s, &sink, &cancel).unwrap_err();
    assert!(matches!(err, TransformError::Cancelled));
    assert_eq!(s, before);
}

struct Faulty;

impl Transform for Faulty {
    fn name(&self) -> &str {
        "Faulty"
    }

    fn author(&self) -> &str {
        "tests"
    }

    fn apply(&self, request: &mut TransformRequest<'_>) -> Result<(), TransformError> {
        request.for_each_row(|_, y, row| {
            if y == 3 {
                panic!("row {} exploded", y);
            }
            row.fill(0);
            Ok(())
        })
    }
}

#[test]
fn a_panicking_transform_fails_without_touching_the_surface() {
    let mut s = pattern(8, 8);
    let before = s.clone();
    let err = TransformRunner::run(&Faulty, &mut s, &NoProgress, &CancelToken::new()).unwrap_err();
    match err {
        TransformError::Failed { transform, .. } => assert_eq!(transform, "Faulty"),
        other => panic!("expected a failure, got {:?}", other),
    }
    assert_eq!(s, before);
}

#[test]
fn background_job_returns_the_surface_with_its_outcome() {
    let (tx, rx) = mpsc::channel::<u8>();
    let progress: Arc<dyn ProgressSink> = Arc::new(tx);
    let job = TransformRunner::spawn(Arc::new(Grayscale), pattern(40, 40), progress);
    assert_eq!(job.name(), "Black&White");

    let seen: Vec<u8> = rx.iter().collect();
    let (surface, result) = job.wait().unwrap();
    result.unwrap();
    assert_monotonic_to_100(&seen);

    let px = surface.get(7, 9).unwrap();
    assert_eq!(px[0], px[1]);
    assert_eq!(px[1], px[2]);
    assert_eq!(px[3], 200);
}

/// Scribbles on its working copy, then holds the worker until cancelled.
struct Stall;

impl Transform for Stall {
    fn name(&self) -> &str {
        "Stall"
    }

    fn author(&self) -> &str {
        "tests"
    }

    fn apply(&self, request: &mut TransformRequest<'_>) -> Result<(), TransformError> {
        request.target_mut().clear(Rgba([0, 0, 0, 255]));
        while !request.cancel().is_cancelled() {
            std::thread::sleep(Duration::from_millis(1));
        }
        request.cancel().check()
    }
}

#[test]
fn cancelled_background_job_hands_back_the_untouched_surface() {
    let original = pattern(24, 24);
    let job = TransformRunner::spawn(Arc::new(Stall), original.clone(), Arc::new(NoProgress));
    assert!(!job.token().is_cancelled());
    assert!(job.try_finish().is_none());

    job.cancel();
    assert!(job.token().is_cancelled());

    let (surface, result) = job.wait().unwrap();
    assert!(matches!(result, Err(TransformError::Cancelled)));
    assert_eq!(surface, original);
}

#[test]
fn median_removes_an_isolated_speck() {
    let mut s = PixelSurface::new_filled(9, 9, Rgba([10, 20, 30, 255])).unwrap();
    s.set(4, 4, Rgba([250, 250, 250, 255])).unwrap();
    TransformRunner::run(&MatrixMedian, &mut s, &NoProgress, &CancelToken::new()).unwrap();
    assert_eq!(s.get(4, 4).unwrap(), Rgba([10, 20, 30, 255]));
}
