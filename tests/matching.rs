//! End-to-end matching behaviour on synthetic images.

mod common;

use common::{crop, gray_texture, jpeg, png, recompress, texture};
use image::DynamicImage;
use image_provenance::{MatchConfig, ProvenanceDetective, Verdict, error::ProvenanceError};

fn detective_with(targets: &[(&str, Vec<u8>)]) -> ProvenanceDetective {
    let mut detective = ProvenanceDetective::new();
    for (id, data) in targets {
        detective.register_bytes(id, data).unwrap();
    }
    detective
}

fn score(result: &image_provenance::MatchResult, rule: &str) -> u32 {
    result.outcome(rule).map(|o| o.score).unwrap()
}

#[test]
fn test_identical_bytes_score_full_marks() {
    let original = png(DynamicImage::ImageRgb8(texture(160, 120, 1)));
    let detective = detective_with(&[("beach.png", original.clone())]);

    let result = detective.find_best_match(&original).unwrap();

    assert_eq!(result.best_target_id, "beach.png");
    assert_eq!(score(&result, "metadata"), 30);
    assert_eq!(score(&result, "content_hash"), 10);
    assert_eq!(score(&result, "template"), 60);
    assert_eq!(result.total_score, 100);
    assert_eq!(result.verdict, Verdict::Match);

    let template = result.outcome("template").unwrap();
    assert_eq!(template.template_hits.len(), 5);
    assert!(template.template_hits.iter().all(|hit| hit.confidence > 0.999));
}

#[test]
fn test_recompressed_jpeg_still_matches() {
    let original = jpeg(&DynamicImage::ImageRgb8(texture(160, 120, 2)), 95);
    let candidate = recompress(&original, 85);
    let detective = detective_with(&[
        ("other.png", png(DynamicImage::ImageRgb8(texture(160, 120, 3)))),
        ("harbour.jpg", original),
    ]);

    let result = detective.find_best_match(&candidate).unwrap();

    assert_eq!(result.best_target_id, "harbour.jpg");
    assert!(score(&result, "template") >= 45, "{:?}", result.outcome("template"));
    assert_eq!(result.verdict, Verdict::Match);
}

#[test]
fn test_cropped_candidate_keeps_template_evidence() {
    let original = texture(160, 120, 4);
    let candidate = png(DynamicImage::ImageRgb8(crop(&original, 0.75)));
    let detective = detective_with(&[("street.png", png(DynamicImage::ImageRgb8(original)))]);

    let result = detective.find_best_match(&candidate).unwrap();
    let template = result.outcome("template").unwrap();

    assert!(template.score >= 30, "{}", template.rationale);
    assert!(template.fired);

    let top_left = template.template_hits.iter().find(|h| h.region == "top-left").unwrap();
    assert_eq!(top_left.location, Some((0, 0)));
}

#[test]
fn test_unrelated_image_is_rejected() {
    let detective = detective_with(&[
        ("a.png", png(DynamicImage::ImageRgb8(texture(160, 120, 5)))),
        ("b.png", png(DynamicImage::ImageRgb8(texture(160, 120, 6)))),
    ]);
    let stranger = png(DynamicImage::ImageLuma8(gray_texture(64, 200, 77)));

    let result = detective.find_best_match(&stranger).unwrap();

    assert_eq!(result.verdict, Verdict::NoMatch);
    assert!(result.total_score < 60);
    assert_eq!(score(&result, "content_hash"), 0);
}

#[test]
fn test_duplicate_targets_resolve_to_first_registered() {
    let data = png(DynamicImage::ImageRgb8(texture(96, 96, 8)));
    let detective = detective_with(&[("a", data.clone()), ("b", data.clone())]);

    let result = detective.find_best_match(&data).unwrap();
    assert_eq!(result.best_target_id, "a");
}

#[test]
fn test_evaluation_is_deterministic_and_bounded() {
    let original = texture(128, 96, 9);
    let detective = detective_with(&[
        ("first.png", png(DynamicImage::ImageRgb8(original.clone()))),
        ("second.png", png(DynamicImage::ImageRgb8(texture(100, 140, 10)))),
    ]);

    let candidates = [
        png(DynamicImage::ImageRgb8(crop(&original, 0.6))),
        jpeg(&DynamicImage::ImageRgb8(original), 70),
        png(DynamicImage::ImageLuma8(gray_texture(40, 40, 11))),
    ];

    for candidate in &candidates {
        let first = detective.find_best_match(candidate).unwrap();
        let second = detective.find_best_match(candidate).unwrap();
        assert_eq!(first, second);

        assert!(first.total_score <= 100);
        for outcome in &first.outcomes {
            assert!(outcome.score <= outcome.max_score, "{outcome:?}");
        }
        assert_eq!(first.total_score, first.outcomes.iter().map(|o| o.score).sum::<u32>());
    }
}

#[test]
fn test_corrupt_candidate_is_a_decode_error() {
    let detective = detective_with(&[("a.png", png(DynamicImage::ImageRgb8(texture(64, 64, 12))))]);

    let err = detective.find_best_match(b"definitely not an image").unwrap_err();
    assert!(matches!(err, ProvenanceError::Decode(_)));
}

#[test]
fn test_tiny_target_degrades_template_rule() {
    let tiny = png(DynamicImage::ImageRgb8(texture(20, 20, 13)));
    let detective = detective_with(&[("tiny.png", tiny.clone())]);

    let result = detective.find_best_match(&tiny).unwrap();
    let template = result.outcome("template").unwrap();

    assert_eq!(template.score, 0);
    assert!(template.rationale.contains("unavailable"));
    assert_eq!(result.total_score, 40);
    assert_eq!(result.verdict, Verdict::NoMatch);
}

#[test]
fn test_custom_threshold_changes_verdict() {
    let original = texture(160, 120, 14);
    let candidate = png(DynamicImage::ImageRgb8(crop(&original, 0.75)));

    let config = MatchConfig {
        match_threshold: 100,
        ..MatchConfig::default()
    };
    let mut detective = ProvenanceDetective::with_config(config).unwrap();
    detective
        .register_bytes("street.png", &png(DynamicImage::ImageRgb8(original)))
        .unwrap();

    let result = detective.find_best_match(&candidate).unwrap();
    assert_eq!(result.verdict, Verdict::NoMatch);
}
