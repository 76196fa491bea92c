use super::*;
use crate::clustering::ClusterId;
use crate::filter::PointClass;

/// Dark frame with one bright square whose top-left corner is `(row, col)`.
fn frame_with_block(rows: usize, cols: usize, row: usize, col: usize, side: usize) -> Grid<u8> {
    Grid::from_fn(rows, cols, |r, c| {
        if (row..row + side).contains(&r) && (col..col + side).contains(&c) {
            230
        } else {
            20
        }
    })
}

fn run_session(detector: &mut Detector, config: &DetectionConfig) -> FilterOutcome {
    detector.equalize().unwrap();
    detector
        .calculate_background(odd_window(config.background_window))
        .unwrap();
    detector
        .calculate_signal(odd_window(config.signal_window))
        .unwrap();
    detector.calculate_significance(config.sigma).unwrap();
    detector.cluster(&config.filter).unwrap().clone()
}

// =============================================================================
// Preconditions
// =============================================================================

#[test]
fn test_stages_require_image() {
    let mut detector = Detector::new();
    assert!(matches!(
        detector.equalize(),
        Err(Error::Precondition(Stage::Image))
    ));
    assert!(matches!(
        detector.calculate_background(51),
        Err(Error::Precondition(Stage::Image))
    ));
    assert!(matches!(
        detector.calculate_signal(3),
        Err(Error::Precondition(Stage::Image))
    ));
    assert!(matches!(
        detector.cluster(&FilterConfig::default()),
        Err(Error::Precondition(Stage::Image))
    ));
}

#[test]
fn test_significance_requires_background_then_signal() {
    let mut detector = Detector::new();
    detector.set_image(Grid::new_filled(8, 8, 10u8));

    assert!(matches!(
        detector.calculate_significance(1.0),
        Err(Error::Precondition(Stage::Background))
    ));

    detector.calculate_background(5).unwrap();
    assert!(matches!(
        detector.calculate_significance(1.0),
        Err(Error::Precondition(Stage::Signal))
    ));

    detector.calculate_signal(3).unwrap();
    detector.calculate_significance(1.0).unwrap();
    assert!(detector.significance().is_some());
}

#[test]
fn test_even_window_is_rejected_by_session() {
    let mut detector = Detector::new();
    detector.set_image(Grid::new_filled(8, 8, 10u8));
    assert!(matches!(
        detector.calculate_background(4),
        Err(Error::InvalidKernel(4))
    ));
    assert!(detector.background().is_none());
}

#[test]
fn test_load_pic_without_format() {
    let mut detector = Detector::new();
    let err = detector
        .load_file(Path::new("frame.pic"), None)
        .unwrap_err();
    assert!(matches!(err, Error::PicFormatRequired(_)));
    assert!(detector.image().is_none());
}

// =============================================================================
// Session behaviour
// =============================================================================

#[test]
fn test_new_image_drops_derived_buffers() {
    let mut detector = Detector::new();
    detector.set_image(Grid::new_filled(8, 8, 10u8));
    detector.calculate_background(5).unwrap();
    detector.calculate_signal(3).unwrap();
    detector.calculate_significance(1.0).unwrap();

    detector.set_image(Grid::new_filled(6, 6, 200u8));
    assert!(detector.background().is_none());
    assert!(detector.signal().is_none());
    assert!(detector.significance().is_none());
    assert_eq!(detector.image().unwrap().shape(), (6, 6));
}

#[test]
fn test_recomputing_signal_drops_mask() {
    let mut detector = Detector::new();
    detector.set_image(Grid::new_filled(8, 8, 10u8));
    detector.calculate_background(5).unwrap();
    detector.calculate_signal(3).unwrap();
    detector.calculate_significance(1.0).unwrap();

    detector.calculate_signal(5).unwrap();
    assert!(detector.significance().is_none());
    assert!(detector.background().is_some());
}

#[test]
fn test_cluster_without_mask_uses_thresholded_image() {
    let mut detector = Detector::new();
    let image = Grid::from_fn(5, 5, |r, c| {
        if (r == 2 && (1..4).contains(&c)) || (c == 2 && (1..4).contains(&r)) {
            200
        } else {
            127
        }
    });
    detector.set_image(image);

    let outcome = detector.cluster(&FilterConfig::default()).unwrap();
    assert_eq!(outcome.kept.len(), 1);
    assert_eq!(outcome.kept[0].size(), 5);
    assert_eq!(outcome.classes[(2, 2)], PointClass::Core);
}

#[test]
fn test_ids_continue_within_a_frame_and_reset_on_new_frame() {
    let mut detector = Detector::new();
    detector.set_image(Grid::new_filled(3, 3, 255u8));
    let config = FilterConfig::default();

    assert_eq!(detector.cluster(&config).unwrap().kept[0].id, ClusterId(0));
    assert_eq!(detector.cluster(&config).unwrap().kept[0].id, ClusterId(1));

    detector.set_image(Grid::new_filled(3, 3, 255u8));
    assert_eq!(detector.cluster(&config).unwrap().kept[0].id, ClusterId(0));
}

// =============================================================================
// One-shot pipeline
// =============================================================================

#[test]
fn test_detect_finds_bright_block() {
    let image = frame_with_block(40, 40, 15, 15, 8);
    let report = detect(&image, &DetectionConfig::default()).unwrap();

    assert_eq!(report.mask.shape(), (40, 40));
    assert_eq!(report.outcome.kept.len(), 1);
    assert_eq!(report.outcome.classes[(19, 19)], PointClass::Core);
    assert_eq!(report.outcome.classes[(2, 2)], PointClass::Background);
}

#[test]
fn test_uniform_frame_has_no_clusters() {
    let image = Grid::new_filled(20, 20, 90u8);
    let report = detect(&image, &DetectionConfig::default()).unwrap();

    assert!(report.mask.iter().all(|&v| !v));
    assert!(report.outcome.kept.is_empty());
    assert_eq!(report.outcome.statistics, None);
}

#[test]
fn test_session_matches_one_shot_pipeline() {
    let image = frame_with_block(40, 40, 10, 20, 8);
    let config = DetectionConfig::default();

    let mut detector = Detector::new();
    detector.set_image(image.clone());
    let outcome = run_session(&mut detector, &config);

    let report = detect(&image, &config).unwrap();
    assert_eq!(outcome, report.outcome);
    assert_eq!(detector.significance(), Some(&report.mask));
}

#[test]
fn test_detect_rejects_invalid_sigma() {
    let image = frame_with_block(20, 20, 5, 5, 6);
    let config = DetectionConfig {
        sigma: -1.0,
        ..DetectionConfig::default()
    };
    assert!(matches!(detect(&image, &config), Err(Error::InvalidSigma(_))));
}

#[test]
fn test_parallel_batch_matches_sequential() {
    let frames: Vec<Grid<u8>> = (0..6)
        .map(|i| frame_with_block(36, 36, 4 + i * 3, 20 - i * 2, 7))
        .collect();
    let config = DetectionConfig::default();

    let parallel = detect_frames(&frames, &config);
    assert_eq!(parallel.len(), frames.len());

    for (frame, result) in frames.iter().zip(parallel) {
        let expected = detect(frame, &config).unwrap();
        assert_eq!(result.unwrap(), expected);
    }
}
