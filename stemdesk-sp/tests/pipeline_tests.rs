//! End-to-end pipeline runs against fake collaborators

mod helpers;

use helpers::*;
use std::sync::Arc;
use stemdesk_sp::collaborators::Collaborators;
use stemdesk_sp::models::{ComponentLabel, Scope};
use stemdesk_sp::services::audio_io::{probe_wav, read_wav};
use stemdesk_sp::services::ArtifactStore;
use stemdesk_sp::workflow::{PipelineError, SeparationPipeline};
use tempfile::TempDir;

fn pipeline(temp: &TempDir, segment_seconds: f64, collaborators: &Collaborators) -> SeparationPipeline {
    let config = test_config(temp.path(), segment_seconds);
    SeparationPipeline::new(&config, ArtifactStore::new(temp.path().to_path_buf()), collaborators).unwrap()
}

fn copy_collaborators(separation: CopySeparation) -> Collaborators {
    collaborators(Arc::new(separation), None, Arc::new(ScriptedDiarizer::default()))
}

#[tokio::test]
async fn test_95_second_upload_with_failed_chunk_four() {
    let temp = TempDir::new().unwrap();
    let upload = temp.path().join("upload_song.wav");
    write_float_wav(&upload, &ramp(95.0), RATE);

    let collaborators = copy_collaborators(CopySeparation::failing(vec![4]));
    let report = pipeline(&temp, 10.0, &collaborators)
        .run(Scope::Shared, &upload)
        .await
        .unwrap();

    assert_eq!(report.total_chunks, 10);
    assert_eq!(report.succeeded_chunks, vec![0, 1, 2, 3, 5, 6, 7, 8, 9]);
    assert_eq!(report.failed_chunks.len(), 1);
    assert_eq!(report.failed_chunks[0].index, 4);

    // 8 full chunks plus the 5 second tail
    for label in ComponentLabel::ALL {
        let merged = probe_wav(&temp.path().join(format!("merged_{}.wav", label))).unwrap();
        assert_eq!(merged.frames, 85 * RATE, "{}", label);

        let denoised = probe_wav(&temp.path().join(format!("denoised_merged_{}.wav", label))).unwrap();
        assert_eq!(denoised.frames, 85 * RATE, "{}", label);
        assert_eq!(denoised.channels, 1);
    }

    assert_eq!(
        report.available_files(),
        vec![
            "denoised_merged_bass.wav",
            "denoised_merged_vocal.wav",
            "denoised_merged_drum.wav",
            "denoised_merged_music.wav",
        ]
    );
}

#[tokio::test]
async fn test_merged_output_skips_failed_chunk_in_order() {
    let temp = TempDir::new().unwrap();
    let upload = temp.path().join("upload_song.wav");
    let source = ramp(4.0);
    write_float_wav(&upload, &source, RATE);

    let collaborators = copy_collaborators(CopySeparation::failing(vec![1]));
    pipeline(&temp, 1.0, &collaborators)
        .run(Scope::Shared, &upload)
        .await
        .unwrap();

    let second = RATE as usize;
    let expected: Vec<f32> = [0, 2, 3]
        .iter()
        .flat_map(|&chunk| source[chunk * second..(chunk + 1) * second].iter().copied())
        .collect();

    for label in ComponentLabel::ALL {
        let merged = read_wav(&temp.path().join(format!("merged_{}.wav", label))).unwrap();
        assert_eq!(merged.samples, expected, "{}", label);
    }
}

#[tokio::test]
async fn test_chunk_files_are_removed_after_run() {
    let temp = TempDir::new().unwrap();
    let upload = temp.path().join("upload_song.wav");
    write_float_wav(&upload, &ramp(3.5), RATE);

    let collaborators = copy_collaborators(CopySeparation::default());
    pipeline(&temp, 1.0, &collaborators)
        .run(Scope::Shared, &upload)
        .await
        .unwrap();

    let leftovers: Vec<String> = std::fs::read_dir(temp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("temp_chunk_") || name.ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty(), "{:?}", leftovers);
}

#[tokio::test]
async fn test_every_chunk_failing_is_an_empty_result() {
    let temp = TempDir::new().unwrap();
    let upload = temp.path().join("upload_song.wav");
    write_float_wav(&upload, &ramp(3.0), RATE);

    let collaborators = copy_collaborators(CopySeparation::failing(vec![0, 1, 2]));
    let err = pipeline(&temp, 1.0, &collaborators)
        .run(Scope::Shared, &upload)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NoSurvivingChunks { total: 3, failed: 3 }));
    assert!(!temp.path().join("merged_vocal.wav").exists());
}

#[tokio::test]
async fn test_enhancement_failure_is_isolated_to_one_component() {
    let temp = TempDir::new().unwrap();
    let upload = temp.path().join("upload_song.wav");
    write_float_wav(&upload, &ramp(2.0), RATE);

    let separation = CopySeparation {
        silent: Some(ComponentLabel::Drum),
        ..CopySeparation::default()
    };
    let collaborators = collaborators(
        Arc::new(separation),
        Some(Arc::new(RejectSilence)),
        Arc::new(ScriptedDiarizer::default()),
    );

    let report = pipeline(&temp, 1.0, &collaborators)
        .run(Scope::Shared, &upload)
        .await
        .unwrap();

    assert_eq!(report.components[&ComponentLabel::Drum], None);
    assert_eq!(
        report.components[&ComponentLabel::Vocal].as_deref(),
        Some("denoised_merged_vocal.wav")
    );
    assert!(!temp.path().join("denoised_merged_drum.wav").exists());
    assert!(temp.path().join("denoised_merged_bass.wav").exists());
    assert!(temp.path().join("denoised_merged_music.wav").exists());
}

#[tokio::test]
async fn test_rerun_replaces_previous_outputs() {
    let temp = TempDir::new().unwrap();
    let first = temp.path().join("upload_first.wav");
    write_float_wav(&first, &ramp(2.0), RATE);
    let collaborators = copy_collaborators(CopySeparation::default());
    let pipeline = pipeline(&temp, 1.0, &collaborators);
    pipeline.run(Scope::Shared, &first).await.unwrap();

    let second = temp.path().join("upload_second.wav");
    write_float_wav(&second, &ramp(3.0), RATE);
    pipeline.run(Scope::Shared, &second).await.unwrap();

    let merged = probe_wav(&temp.path().join("merged_bass.wav")).unwrap();
    assert_eq!(merged.frames, 3 * RATE);
}

#[tokio::test]
async fn test_session_scope_writes_under_sessions_dir() {
    let temp = TempDir::new().unwrap();
    let id = uuid::Uuid::new_v4();
    let store = ArtifactStore::new(temp.path().to_path_buf());
    let dir = store.ensure_dir(Scope::Session(id)).unwrap();
    let upload = dir.join("upload_song.wav");
    write_float_wav(&upload, &ramp(1.5), RATE);

    let collaborators = copy_collaborators(CopySeparation::default());
    let report = pipeline(&temp, 1.0, &collaborators)
        .run(Scope::Session(id), &upload)
        .await
        .unwrap();

    assert_eq!(report.total_chunks, 2);
    assert!(dir.join("denoised_merged_vocal.wav").exists());
    assert!(!temp.path().join("denoised_merged_vocal.wav").exists());
}

fn assert_send<T: Send>(_: &T) {}

#[test]
fn test_pipeline_future_is_send() {
    let temp = TempDir::new().unwrap();
    let upload = temp.path().join("upload_song.wav");
    let collaborators = copy_collaborators(CopySeparation::default());
    let pipeline = pipeline(&temp, 1.0, &collaborators);

    // Handlers hold this future across awaits, so axum needs it to be Send
    let run = pipeline.run(Scope::Shared, &upload);
    assert_send(&run);
}

#[tokio::test]
async fn test_new_upload_clears_previous_speakers_and_normalized_files() {
    let temp = TempDir::new().unwrap();
    let store = ArtifactStore::new(temp.path().to_path_buf());
    let collaborators = copy_collaborators(CopySeparation::default());
    let pipeline = pipeline(&temp, 1.0, &collaborators);

    let first = temp.path().join("upload_first.wav");
    write_float_wav(&first, &ramp(2.0), RATE);
    pipeline.run(Scope::Shared, &first).await.unwrap();

    let speakers = store.speakers_dir(Scope::Shared);
    std::fs::create_dir_all(&speakers).unwrap();
    std::fs::write(speakers.join("speaker_speaker00.wav"), b"old").unwrap();
    std::fs::write(speakers.join("speaker_speaker00_normalized.wav"), b"old").unwrap();
    let normalized = temp.path().join("denoised_merged_vocal_normalized.wav");
    std::fs::write(&normalized, b"old").unwrap();

    let second = temp.path().join("upload_second.wav");
    write_float_wav(&second, &ramp(3.0), RATE);
    pipeline.run(Scope::Shared, &second).await.unwrap();

    assert!(!speakers.join("speaker_speaker00.wav").exists());
    assert!(!speakers.join("speaker_speaker00_normalized.wav").exists());
    assert!(!normalized.exists());

    let bundle = store.bundle(Scope::Shared).unwrap();
    let archive = zip::ZipArchive::new(std::fs::File::open(bundle).unwrap()).unwrap();
    let mut members: Vec<&str> = archive.file_names().collect();
    members.sort();
    assert_eq!(
        members,
        vec![
            "denoised_merged_bass.wav",
            "denoised_merged_drum.wav",
            "denoised_merged_music.wav",
            "denoised_merged_vocal.wav",
        ]
    );
}
