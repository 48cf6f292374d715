//! Batch orchestration against an in-process signing service.

mod common;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::fixtures::{offline_config, outside_gap, sample_pdf, write_file};
use common::pki::{crl_issuer, detached_cms, signed_crl};
use common::transport::{
    error_body, success_body, ScriptedTransport, CMS_TAG, REQUESTER_ERROR, TIMESTAMP_TAG,
};
use remote_pdf_signer::domain::pdf::{Dict, PdfDocument};
use remote_pdf_signer::services::vri_key;
use remote_pdf_signer::{
    CertificationLevel, DocumentOutcome, HashAlgorithm, ModeInputs, Reporter, SignJob,
    SignWorkflow, SignatureMetadata, SigningError, SigningMode, SigningState,
};
use std::fs;
use std::path::Path;

fn workflow(mode: SigningMode, metadata: SignatureMetadata, transport: ScriptedTransport) -> SignWorkflow {
    SignWorkflow::new(
        mode,
        metadata,
        &offline_config(),
        Box::new(transport),
        Reporter::default(),
    )
    .unwrap()
}

fn jobs(dir: &Path, count: usize) -> Vec<SignJob> {
    (0..count)
        .map(|i| {
            let input = write_file(dir, &format!("in{i}.pdf"), &sample_pdf(i + 1));
            SignJob::new(input, dir.join(format!("out{i}.pdf")))
        })
        .collect()
}

fn digest_values(request: &str) -> Vec<Vec<u8>> {
    request
        .split("<dsig:DigestValue>")
        .skip(1)
        .filter_map(|part| part.split_once("</dsig:DigestValue>"))
        .map(|(value, _)| STANDARD.decode(value).unwrap())
        .collect()
}

fn byte_range_of(signed: &[u8]) -> [usize; 4] {
    let document = PdfDocument::load(signed.to_vec()).unwrap();
    let field = document.signature_fields().unwrap().pop().unwrap();
    let values: Vec<usize> = field.signature["ByteRange"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o.as_integer().unwrap() as usize)
        .collect();
    [values[0], values[1], values[2], values[3]]
}

#[test]
fn test_timestamp_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = jobs(dir.path(), 1);
    let token = detached_cms(b"token stand-in");
    let expected = token.clone();
    let transport = ScriptedTransport::per_digest(TIMESTAMP_TAG, move |_| expected.clone());
    let requests = transport.requests();
    let mut flow = workflow(SigningMode::Timestamp, SignatureMetadata::default(), transport);

    let report = flow.run(&jobs).unwrap();
    assert!(report.is_complete_success());
    assert_eq!(report.state, SigningState::Signed);

    let original = fs::read(&jobs[0].input).unwrap();
    let signed = fs::read(&jobs[0].output).unwrap();
    assert!(signed.starts_with(&original), "signing must only append");

    // The digest sent to the service covers everything but the gap.
    let range = byte_range_of(&signed);
    assert_eq!(range[0], 0);
    assert_eq!(range[2] + range[3], signed.len());
    let sent = digest_values(&requests.borrow()[0]);
    assert_eq!(sent.len(), 1);
    assert_eq!(HashAlgorithm::Sha256.digest(&outside_gap(&signed, range)), sent[0]);

    // The gap holds the token, hex encoded and zero padded.
    let gap = &signed[range[1]..range[2]];
    assert_eq!(gap[0], b'<');
    assert_eq!(*gap.last().unwrap(), b'>');
    let hex_token = hex::encode_upper(&token);
    assert!(gap[1..].starts_with(hex_token.as_bytes()));
    assert!(gap[1 + hex_token.len()..gap.len() - 1].iter().all(|&b| b == b'0'));

    let text = String::from_utf8_lossy(&signed);
    assert!(text.contains("/SubFilter /ETSI.RFC3161"));
    assert!(text.contains("/Type /DocTimeStamp"));
}

#[test]
fn test_non_success_mutates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = jobs(dir.path(), 2);
    let transport = ScriptedTransport::fixed(error_body(
        REQUESTER_ERROR,
        "http://ais.swisscom.ch/1.0/resultminor/AuthenticationFailed",
        "Authentication failed",
    ));
    let requests = transport.requests();
    let mut flow = workflow(SigningMode::StaticIdentity, SignatureMetadata::default(), transport);

    let err = flow.run(&jobs).unwrap_err();
    match err {
        SigningError::ServiceError { major, minor, message } => {
            assert_eq!(major, REQUESTER_ERROR);
            assert!(minor.unwrap().ends_with("AuthenticationFailed"));
            assert_eq!(message.as_deref(), Some("Authentication failed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(requests.borrow().len(), 1);
    assert_eq!(flow.state(), SigningState::Failed);
    assert!(jobs.iter().all(|job| !job.output.exists()));
}

#[test]
fn test_transport_failure_mutates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = jobs(dir.path(), 1);
    let mut flow = workflow(
        SigningMode::Timestamp,
        SignatureMetadata::default(),
        ScriptedTransport::unreachable(),
    );

    let err = flow.run(&jobs).unwrap_err();
    assert!(err.is_batch_fatal());
    assert!(!jobs[0].output.exists());
}

#[test]
fn test_batch_isolates_failing_patch() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = jobs(dir.path(), 3);
    // The second signature does not fit the reserved space.
    let transport = ScriptedTransport::per_digest(CMS_TAG, |i| {
        if i == 1 {
            vec![0x30; 22_001]
        } else {
            detached_cms(b"batch")
        }
    });
    let requests = transport.requests();
    let mut flow = workflow(SigningMode::StaticIdentity, SignatureMetadata::default(), transport);

    let report = flow.run(&jobs).unwrap();
    assert_eq!(requests.borrow().len(), 1);
    assert!(requests.borrow()[0].contains("http://ais.swisscom.ch/1.0/profiles/batchprocessing"));
    assert_eq!(report.signed_count(), 2);
    assert_eq!(report.state, SigningState::Signed);
    assert!(jobs[0].output.exists());
    assert!(!jobs[1].output.exists());
    assert!(jobs[2].output.exists());
    assert!(matches!(
        &report.documents[1].outcome,
        DocumentOutcome::Failed { reason } if reason.contains("22001")
    ));
}

#[test]
fn test_batch_skips_unreadable_document() {
    let dir = tempfile::tempdir().unwrap();
    let mut jobs = jobs(dir.path(), 3);
    jobs[1].input = write_file(dir.path(), "broken.pdf", b"not a pdf at all");
    let transport = ScriptedTransport::per_digest(CMS_TAG, |_| detached_cms(b"batch"));
    let requests = transport.requests();
    let mut flow = workflow(SigningMode::StaticIdentity, SignatureMetadata::default(), transport);

    let report = flow.run(&jobs).unwrap();
    assert_eq!(digest_values(&requests.borrow()[0]).len(), 2);
    assert_eq!(report.signed_count(), 2);
    assert!(!jobs[1].output.exists());
    assert!(matches!(report.documents[1].outcome, DocumentOutcome::Failed { .. }));
}

#[test]
fn test_payload_count_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = jobs(dir.path(), 2);
    let body = success_body(CMS_TAG, &[detached_cms(b"only one")], &[], &[]);
    let mut flow = workflow(
        SigningMode::StaticIdentity,
        SignatureMetadata::default(),
        ScriptedTransport::fixed(body),
    );

    assert!(matches!(flow.run(&jobs), Err(SigningError::ProtocolError(_))));
    assert!(jobs.iter().all(|job| !job.output.exists()));
}

#[test]
fn test_invalid_revocation_data_keeps_signature() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = jobs(dir.path(), 1);
    let body = success_body(CMS_TAG, &[detached_cms(b"ltv")], &[vec![1, 2, 3]], &[]);
    let mut flow = workflow(
        SigningMode::StaticIdentity,
        SignatureMetadata::default(),
        ScriptedTransport::fixed(body),
    );

    let report = flow.run(&jobs).unwrap();
    assert_eq!(report.state, SigningState::Signed);
    assert_eq!(
        report.documents[0].outcome,
        DocumentOutcome::Signed {
            revocation_merged: false
        }
    );
    assert!(jobs[0].output.exists());
}

fn array_len(document: &PdfDocument, dict: &Dict, key: &str) -> usize {
    dict.get(key)
        .map(|value| document.resolve(value).unwrap())
        .and_then(|value| value.as_array().map(Vec::len))
        .unwrap_or(0)
}

#[test]
fn test_crl_is_merged_after_signing() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = jobs(dir.path(), 1);
    let issuer = crl_issuer();
    let crl = signed_crl(&issuer);
    let parsed = openssl::x509::X509Crl::from_der(&crl).unwrap();
    assert!(parsed.verify(&issuer.key).unwrap());

    let cms = detached_cms(b"ltv");
    let transport = ScriptedTransport::fixed(success_body(CMS_TAG, &[cms.clone()], &[], &[crl]));
    let requests = transport.requests();
    let mut flow = workflow(SigningMode::StaticIdentity, SignatureMetadata::default(), transport);

    let report = flow.run(&jobs).unwrap();
    assert_eq!(report.state, SigningState::RevocationMerged);
    assert_eq!(
        report.documents[0].outcome,
        DocumentOutcome::Signed {
            revocation_merged: true
        }
    );

    let original = fs::read(&jobs[0].input).unwrap();
    let merged = fs::read(&jobs[0].output).unwrap();
    assert!(merged.starts_with(&original));

    // The validation data is a later revision outside the signed ranges.
    let range = byte_range_of(&merged);
    assert!(range[2] + range[3] < merged.len());
    let sent = digest_values(&requests.borrow()[0]);
    assert_eq!(HashAlgorithm::Sha256.digest(&outside_gap(&merged, range)), sent[0]);

    let document = PdfDocument::load(merged).unwrap();
    let catalog = document.catalog().unwrap();
    let dss = document.resolve_dict(&catalog, "DSS").unwrap().unwrap();
    assert_eq!(array_len(&document, &dss, "CRLs"), 1);
    assert_eq!(array_len(&document, &dss, "OCSPs"), 0);

    let field = document.signature_fields().unwrap().pop().unwrap();
    let contents = field.signature["Contents"].as_string().unwrap();
    assert_eq!(vri_key(contents), vri_key(&cms));
    let vri = document.resolve_dict(&dss, "VRI").unwrap().unwrap();
    let entry = document.resolve_dict(&vri, &vri_key(&cms)).unwrap().unwrap();
    assert_eq!(array_len(&document, &entry, "CRL"), 1);
}

#[test]
fn test_certified_document_cannot_be_certified_again() {
    let dir = tempfile::tempdir().unwrap();
    let first = jobs(dir.path(), 1);
    let certify = SignatureMetadata {
        certification: Some(CertificationLevel::FormFilling),
        ..SignatureMetadata::default()
    };
    let transport = ScriptedTransport::per_digest(CMS_TAG, |_| detached_cms(b"certify"));
    let mut flow = workflow(SigningMode::StaticIdentity, certify.clone(), transport);
    assert!(flow.run(&first).unwrap().is_complete_success());

    let certified = fs::read(&first[0].output).unwrap();
    let document = PdfDocument::load(certified.clone()).unwrap();
    assert_eq!(
        document.certification_level().unwrap(),
        Some(CertificationLevel::FormFilling)
    );

    let second = vec![SignJob::new(&first[0].output, dir.path().join("again.pdf"))];
    let transport = ScriptedTransport::per_digest(CMS_TAG, |_| detached_cms(b"certify"));
    let requests = transport.requests();
    let mut flow = workflow(SigningMode::StaticIdentity, certify, transport);
    let report = flow.run(&second).unwrap();

    assert_eq!(report.state, SigningState::Failed);
    assert!(requests.borrow().is_empty());
    assert!(!dir.path().join("again.pdf").exists());
    assert_eq!(fs::read(&first[0].output).unwrap(), certified);

    // An approval signature on top is still allowed at level 2.
    let third = vec![SignJob::new(&first[0].output, dir.path().join("approved.pdf"))];
    let transport = ScriptedTransport::per_digest(CMS_TAG, |_| detached_cms(b"approve"));
    let mut flow = workflow(SigningMode::StaticIdentity, SignatureMetadata::default(), transport);
    assert!(flow.run(&third).unwrap().is_complete_success());
    let approved = PdfDocument::load(fs::read(dir.path().join("approved.pdf")).unwrap()).unwrap();
    assert_eq!(approved.signature_fields().unwrap().len(), 2);
}

#[test]
fn test_on_demand_step_up_request() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = jobs(dir.path(), 1);
    let mode = SigningMode::derive(&ModeInputs {
        distinguished_name: Some("cn=Hans Muster,o=ACME,c=CH".into()),
        msisdn: Some("+41791234567".into()),
        message: Some("Sign contract SPDF.00001.0001?".into()),
        language: Some("en".into()),
        ..ModeInputs::default()
    })
    .unwrap();
    let transport = ScriptedTransport::per_digest(CMS_TAG, |_| detached_cms(b"on demand"));
    let requests = transport.requests();
    let mut flow = workflow(mode, SignatureMetadata::default(), transport);

    assert!(flow.run(&jobs).unwrap().is_complete_success());
    let request = &requests.borrow()[0];
    assert!(request.contains("<Name>ACME:ondemand-key</Name>"));
    assert!(request.contains("http://ais.swisscom.ch/1.0/profiles/ondemandcertificate"));
    assert!(request.contains("<sc:DistinguishedName>cn=Hans Muster,o=ACME,c=CH</sc:DistinguishedName>"));
    assert!(request.contains("<sc:Message>Sign contract SPDF.00001.0001?</sc:Message>"));
    assert!(!request.contains("batchprocessing"));
}
