use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;

use watchdog_edge::capability::{DiffCapability, FaceCapability, PixelDiffBackend, StubFaceBackend};
use watchdog_edge::classify::{KnownFace, KnownFaceGallery, Thresholds, Verdict};
use watchdog_edge::ingest::{
    EdgeIdentity, IncidentPipeline, PipelineParts, ReaderSource, NEW_REFERENCE_REASON,
};
use watchdog_edge::protocol::{Detection, IncidentKind, IncidentRecord};
use watchdog_edge::runtime::Shutdown;
use watchdog_edge::sink::{EventKind, RecordingSink, NO_IMAGE_URL};
use watchdog_edge::telemetry::TelemetrySnapshot;
use watchdog_edge::{Classifier, ReferenceImage, ReferenceStore};

fn png(color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(8, 8, Rgb(color));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

/// One incident as the Reporter prints it. The end marker follows the image
/// on the same line so the decoded image equals `image` exactly.
fn incident(type_line: &str, image: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"boot noise\r\n");
    out.extend_from_slice(b"=== INCIDENT REPORT ===\r\n");
    out.extend_from_slice(type_line.as_bytes());
    out.extend_from_slice(b"\r\n--- FOTO START ---\r\n");
    out.extend_from_slice(image);
    out.extend_from_slice(b"--- FOTO END ---\r\n");
    out
}

struct Harness {
    _dir: TempDir,
    pipeline: IncidentPipeline,
    sink: RecordingSink,
    faces: Arc<StubFaceBackend>,
    telemetry: TelemetrySnapshot,
}

fn harness(faces: StubFaceBackend, gallery: KnownFaceGallery, sink: RecordingSink) -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let reference = dir.path().join("ref/reference.jpg");
    harness_with_reference(dir, reference, faces, gallery, sink)
}

fn harness_with_reference(
    dir: TempDir,
    reference: PathBuf,
    faces: StubFaceBackend,
    gallery: KnownFaceGallery,
    sink: RecordingSink,
) -> Harness {
    let faces = Arc::new(faces);
    let telemetry = TelemetrySnapshot::default();
    let face_cap: Arc<dyn FaceCapability> = faces.clone();
    let diff_cap: Arc<dyn DiffCapability> = Arc::new(PixelDiffBackend::new());
    let pipeline = IncidentPipeline::new(PipelineParts {
        identity: EdgeIdentity {
            edge_id: "edge-7".to_string(),
            device_id: "reporter-1".to_string(),
        },
        classifier: Classifier::new(Thresholds::default()),
        gallery: Arc::new(gallery),
        reference: ReferenceStore::open(reference, None),
        faces: face_cap,
        diff: diff_cap,
        sink: Box::new(sink.clone()),
        telemetry: telemetry.clone(),
    });
    Harness {
        _dir: dir,
        pipeline,
        sink,
        faces,
        telemetry,
    }
}

fn default_harness() -> Harness {
    harness(
        StubFaceBackend::new(),
        KnownFaceGallery::default(),
        RecordingSink::new(),
    )
}

fn replay(h: &mut Harness, bytes: Vec<u8>) {
    let mut source = ReaderSource::new("capture", Cursor::new(bytes));
    h.pipeline
        .run(&mut source, &Shutdown::new())
        .expect("replay runs to completion");
}

fn detection(category: &str, value: i64, image: Vec<u8>) -> IncidentRecord {
    IncidentRecord {
        kind: IncidentKind::Detection(Detection {
            category: category.to_string(),
            value,
        }),
        image,
    }
}

#[test]
fn imu_detection_without_reference_is_positive() {
    let mut h = default_harness();
    h.telemetry.replace("HR=72;T=36.6".to_string());
    replay(&mut h, incident("TYPE:DETECTION:IMU_Y:0", &png([10, 10, 10])));

    let docs = h.sink.documents();
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.kind, EventKind::Event);
    assert_eq!(doc.verdict, Verdict::Positive);
    assert_eq!(doc.reasons, vec!["IMU activated (IMU_Y)".to_string()]);
    assert_eq!(doc.edge_id, "edge-7");
    assert_eq!(doc.device_id, "reporter-1");
    assert_eq!(doc.telemetry_snapshot, "HR=72;T=36.6");
    assert!(doc.image_url.starts_with("memory://evidence_"));
    assert_eq!(h.sink.uploads().len(), 1);
    assert_eq!(h.pipeline.processed(), 1);
}

#[test]
fn loud_audio_is_positive() {
    let mut h = default_harness();
    replay(&mut h, incident("TYPE:DETECTION:AUDIO:2500", &png([0, 0, 0])));

    let docs = h.sink.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].verdict, Verdict::Positive);
    assert!(docs[0].reasons.contains(&"loud audio (2500)".to_string()));
}

#[test]
fn quiet_audio_burst_trips_frequency_rule() {
    let mut h = default_harness();
    let start = Instant::now();

    let first = h
        .pipeline
        .process_at(detection("AUDIO", 100, png([0, 0, 0])), start)
        .unwrap();
    assert_eq!(first.verdict, Verdict::Negative);
    assert!(first.reasons.is_empty());

    let second = h
        .pipeline
        .process_at(
            detection("AUDIO", 100, png([0, 0, 0])),
            start + Duration::from_secs(2),
        )
        .unwrap();
    assert_eq!(second.verdict, Verdict::Positive);
    assert_eq!(second.reasons, vec!["audio frequency (2 in 30s)".to_string()]);
    assert_eq!(h.pipeline.audio_count(), 2);
}

#[test]
fn audio_events_outside_window_do_not_count() {
    let mut h = default_harness();
    let start = Instant::now();
    h.pipeline
        .process_at(detection("AUDIO", 100, png([0, 0, 0])), start)
        .unwrap();
    let later = h
        .pipeline
        .process_at(
            detection("AUDIO", 100, png([0, 0, 0])),
            start + Duration::from_secs(31),
        )
        .unwrap();
    assert_eq!(later.verdict, Verdict::Negative);
    assert_eq!(h.pipeline.audio_count(), 1);
}

#[test]
fn known_face_is_negative() {
    let image = png([200, 180, 160]);
    let faces = StubFaceBackend::new().with_faces(&image, vec![vec![1.0, 0.0, 0.0]]);
    let gallery = KnownFaceGallery::new(vec![KnownFace {
        name: "alice".to_string(),
        embedding: vec![0.9, 0.1, 0.0],
    }]);
    let mut h = harness(faces, gallery, RecordingSink::new());

    replay(&mut h, incident("TYPE:DETECTION:PIR:1", &image));

    let docs = h.sink.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].verdict, Verdict::Negative);
    assert_eq!(docs[0].reasons, vec!["identified (alice)".to_string()]);
}

#[test]
fn unknown_face_is_positive() {
    let image = png([200, 180, 160]);
    let faces = StubFaceBackend::new().with_faces(&image, vec![vec![0.0, 1.0, 0.0]]);
    let gallery = KnownFaceGallery::new(vec![KnownFace {
        name: "alice".to_string(),
        embedding: vec![1.0, 0.0, 0.0],
    }]);
    let mut h = harness(faces, gallery, RecordingSink::new());

    replay(&mut h, incident("TYPE:DETECTION:PIR:1", &image));

    let docs = h.sink.documents();
    assert_eq!(docs[0].verdict, Verdict::Positive);
    assert_eq!(docs[0].reasons, vec!["unregistered face".to_string()]);
}

#[test]
fn initial_reference_is_stored_and_reported_without_classification() {
    let mut h = default_harness();
    let reference = png([0, 0, 0]);
    replay(&mut h, incident("TYPE:INITIAL_REFERENCE", &reference));

    assert_eq!(h.faces.calls(), 0);
    assert_eq!(h.pipeline.audio_count(), 0);
    let stored = std::fs::read(h.pipeline.reference().path()).expect("reference persisted");
    assert_eq!(stored, reference);
    assert!(h.pipeline.reference().current().is_some());

    let docs = h.sink.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].kind, EventKind::Reference);
    assert_eq!(docs[0].verdict, Verdict::Info);
    assert_eq!(docs[0].reasons, vec![NEW_REFERENCE_REASON.to_string()]);
    let uploads = h.sink.uploads();
    let hint = &uploads[0];
    assert!(hint.starts_with("ref_"));
    assert_eq!(hint.len(), "ref_YYYYMMDD_HHMMSS".len());
    assert_eq!(hint.as_bytes()[12], b'_');
    assert!(hint[4..12].bytes().all(|b| b.is_ascii_digit()));
}

/// Reference path that is a directory, so persisting always fails.
fn unwritable_reference_harness() -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let reference = dir.path().to_path_buf();
    harness_with_reference(
        dir,
        reference,
        StubFaceBackend::new(),
        KnownFaceGallery::default(),
        RecordingSink::new(),
    )
}

#[test]
fn reference_is_kept_in_memory_when_it_cannot_be_persisted() {
    let mut h = unwritable_reference_harness();
    let reference = png([0, 0, 0]);
    let result = h
        .pipeline
        .process_at(
            IncidentRecord {
                kind: IncidentKind::InitialReference,
                image: reference.clone(),
            },
            Instant::now(),
        )
        .expect("reference incident still succeeds");

    assert_eq!(result.verdict, Verdict::Info);
    assert_eq!(
        h.pipeline.reference().current(),
        Some(&ReferenceImage::Memory(reference))
    );
    let docs = h.sink.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].kind, EventKind::Reference);
    assert_eq!(docs[0].verdict, Verdict::Info);
    assert_eq!(h.pipeline.processed(), 1);
}

#[test]
fn streamed_reference_survives_unwritable_path_and_is_compared() {
    let mut h = unwritable_reference_harness();
    let mut stream = incident("TYPE:INITIAL_REFERENCE", &png([0, 0, 0]));
    stream.extend_from_slice(&incident("TYPE:DETECTION:PIR:1", &png([255, 255, 255])));
    replay(&mut h, stream);

    let docs = h.sink.documents();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].kind, EventKind::Reference);
    assert_eq!(docs[0].verdict, Verdict::Info);
    assert_eq!(docs[0].reasons, vec![NEW_REFERENCE_REASON.to_string()]);
    assert!(matches!(
        h.pipeline.reference().current(),
        Some(ReferenceImage::Memory(_))
    ));
    assert_eq!(docs[1].verdict, Verdict::Positive);
    assert_eq!(
        docs[1].reasons,
        vec!["visual change > threshold (100.00%)".to_string()]
    );
}

#[test]
fn visual_change_against_reference_is_positive() {
    let mut h = default_harness();
    let mut stream = incident("TYPE:INITIAL_REFERENCE", &png([0, 0, 0]));
    stream.extend_from_slice(&incident("TYPE:DETECTION:PIR:1", &png([255, 255, 255])));
    stream.extend_from_slice(&incident("TYPE:DETECTION:PIR:1", &png([0, 0, 0])));
    replay(&mut h, stream);

    let docs = h.sink.documents();
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[1].verdict, Verdict::Positive);
    assert_eq!(
        docs[1].reasons,
        vec!["visual change > threshold (100.00%)".to_string()]
    );
    assert_eq!(docs[2].verdict, Verdict::Negative);
    assert!(docs[2].reasons.is_empty());
}

#[test]
fn failed_upload_still_records_document() {
    let mut h = harness(
        StubFaceBackend::new(),
        KnownFaceGallery::default(),
        RecordingSink::failing_uploads(),
    );
    replay(&mut h, incident("TYPE:DETECTION:IMU_X:3", &png([1, 2, 3])));

    let docs = h.sink.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].image_url, NO_IMAGE_URL);
}

#[test]
fn truncated_incident_is_discarded_when_stream_ends() {
    let mut h = default_harness();
    let mut stream = incident("TYPE:DETECTION:IMU_X:3", &png([1, 2, 3]));
    stream.extend_from_slice(b"=== INCIDENT REPORT ===\nTYPE:DETECTION:AUDIO:9000\n--- FOTO START ---\npartial");
    replay(&mut h, stream);

    assert_eq!(h.sink.documents().len(), 1);
    assert_eq!(h.pipeline.decoder().buffered_bytes(), 0);
    let stats = h.pipeline.decoder().stats();
    assert_eq!(stats.incidents, 1);
    assert_eq!(stats.abandoned, 1);
}
