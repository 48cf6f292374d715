//! Round trips against a real signing service.
//!
//! Skipped unless `SIGNPDF_LIVE_CONFIG` names a configuration file whose
//! client certificate is enrolled with the service.

mod common;

use common::fixtures::{sample_pdf, write_file};
use common::test_env::live_config;
use remote_pdf_signer::{
    ConfigManager, DssClient, DssClientConfig, ModeInputs, Reporter, SignJob, SignWorkflow,
    SignatureMetadata, SigningMode, SigningState,
};

fn run(mode: SigningMode, count: usize) -> Option<SigningState> {
    let Some(path) = live_config() else {
        eprintln!("SIGNPDF_LIVE_CONFIG not set, skipping");
        return None;
    };
    let config = ConfigManager::discover(Some(&path)).unwrap().load().unwrap();
    let client = DssClient::new(DssClientConfig::from_configuration(&config).unwrap()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let jobs: Vec<SignJob> = (0..count)
        .map(|i| {
            let input = write_file(dir.path(), &format!("in{i}.pdf"), &sample_pdf(1));
            SignJob::new(input, dir.path().join(format!("out{i}.pdf")))
        })
        .collect();

    let mut workflow = SignWorkflow::new(
        mode,
        SignatureMetadata::default(),
        &config,
        Box::new(client),
        Reporter::default(),
    )
    .unwrap();
    let report = workflow.run(&jobs).unwrap();
    assert!(report.is_complete_success());
    assert!(jobs.iter().all(|job| job.output.exists()));
    Some(report.state)
}

#[test]
fn test_live_timestamp() {
    if let Some(state) = run(SigningMode::Timestamp, 1) {
        assert!(matches!(state, SigningState::Signed | SigningState::RevocationMerged));
    }
}

#[test]
fn test_live_static_batch() {
    let mode = SigningMode::derive(&ModeInputs::default()).unwrap();
    if let Some(state) = run(mode, 2) {
        assert!(matches!(state, SigningState::Signed | SigningState::RevocationMerged));
    }
}
