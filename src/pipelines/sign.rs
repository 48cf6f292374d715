//! `SignWorkflow` orchestrates one signing batch.
//!
//! Reserve a placeholder in every document, send all digests in a single
//! request, then apply the returned signatures in request order. A failure
//! confined to one document is recorded and the batch carries on; a failed
//! round trip or a non-success result leaves every document untouched.

use super::state::{SigningState, StateMachine};
use crate::adapters::remote::{round_trip, SigningTransport};
use crate::domain::mode::SigningMode;
use crate::domain::request::SigningRequest;
use crate::domain::response::{Diagnostic, ResultStatus};
use crate::domain::types::RequestId;
use crate::infra::config::SigningConfiguration;
use crate::infra::error::{SigningError, SigningResult};
use crate::infra::report::Reporter;
use crate::services::{PendingSignature, PlaceholderManager, SignatureMetadata};
use chrono::Local;
use std::path::{Path, PathBuf};

/// One input/output pair of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl SignJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Signed { revocation_merged: bool },
    Failed { reason: String },
    /// Never sent to the service because the batch failed as a whole
    NotAttempted,
}

#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub job: SignJob,
    pub outcome: DocumentOutcome,
}

/// Per-document results of a batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub state: SigningState,
    pub diagnostic: Option<Diagnostic>,
    pub documents: Vec<DocumentReport>,
}

impl BatchReport {
    #[must_use]
    pub fn signed_count(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| matches!(d.outcome, DocumentOutcome::Signed { .. }))
            .count()
    }

    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        !self.documents.is_empty() && self.signed_count() == self.documents.len()
    }
}

pub struct SignWorkflow {
    mode: SigningMode,
    placeholder: PlaceholderManager,
    transport: Box<dyn SigningTransport>,
    claimed_identity: String,
    reporter: Reporter,
    machine: StateMachine,
}

impl SignWorkflow {
    /// Everything here is checked before any file or network access.
    pub fn new(
        mode: SigningMode,
        metadata: SignatureMetadata,
        config: &SigningConfiguration,
        transport: Box<dyn SigningTransport>,
        reporter: Reporter,
    ) -> SigningResult<Self> {
        let algorithm = config.digest_algorithm()?;
        let placeholder = PlaceholderManager::new(
            mode.signature_kind(),
            mode.estimated_size(),
            algorithm,
            metadata,
        )?;
        let claimed_identity =
            mode.claimed_identity(&config.customer, &config.key_static, &config.key_on_demand);
        log::info!(
            "Signing mode {} as '{claimed_identity}' with {algorithm}",
            mode.name()
        );

        Ok(Self {
            mode,
            placeholder,
            transport,
            claimed_identity,
            reporter,
            machine: StateMachine::new(),
        })
    }

    #[must_use]
    pub fn mode(&self) -> &SigningMode {
        &self.mode
    }

    #[must_use]
    pub fn state(&self) -> SigningState {
        self.machine.state()
    }

    /// Sign every job in one request.
    ///
    /// Returns `Err` only for failures that affect the whole batch; failures
    /// of individual documents are in the report.
    pub fn run(&mut self, jobs: &[SignJob]) -> SigningResult<BatchReport> {
        if jobs.is_empty() {
            return Err(SigningError::InvalidInput(
                "No documents to sign".to_string(),
            ));
        }
        if self.machine.state() != SigningState::Idle {
            return Err(SigningError::StateError(format!(
                "workflow already used (state {})",
                self.machine.state()
            )));
        }

        let mut outcomes: Vec<DocumentOutcome> = vec![DocumentOutcome::NotAttempted; jobs.len()];
        let signing_time = Local::now() + self.mode.signing_time_offset();

        // Reserve
        let mut pending: Vec<(usize, PendingSignature)> = Vec::with_capacity(jobs.len());
        for (index, job) in jobs.iter().enumerate() {
            match self
                .placeholder
                .reserve_and_digest(&job.input, &job.output, signing_time)
            {
                Ok((_, handle)) => pending.push((index, handle)),
                Err(e) => {
                    log::error!("Cannot prepare {}: {e}", job.input.display());
                    self.reporter.failed(&[job.input.as_path()], &e.to_string());
                    outcomes[index] = DocumentOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            }
        }
        if pending.is_empty() {
            self.machine.fail();
            return Ok(self.report(jobs, outcomes, None));
        }
        self.machine.advance(SigningState::DigestReady)?;

        // Round trip
        let digests = pending.iter().map(|(_, p)| p.digest().clone()).collect();
        let request = match SigningRequest::new(
            RequestId::generate(),
            &self.mode,
            self.claimed_identity.as_str(),
            digests,
        ) {
            Ok(request) => request,
            Err(e) => return Err(self.abort(pending, e)),
        };
        self.reporter
            .detail(&format!("Request ID {}", request.request_id()));
        self.machine.advance(SigningState::RequestSent)?;

        let response = match round_trip(self.transport.as_ref(), &request) {
            Ok(response) => response,
            Err(e) => return Err(self.abort(pending, e)),
        };
        self.machine.advance(SigningState::ResponsePending)?;
        self.reporter.result(&response.diagnostic);

        if response.status != ResultStatus::Success {
            let diagnostic = response.diagnostic;
            if response.status == ResultStatus::Pending {
                log::error!("Service answered with a pending result; asynchronous processing is not supported");
            }
            let inputs: Vec<&Path> = jobs.iter().map(|j| j.input.as_path()).collect();
            self.reporter.failed(&inputs, &diagnostic.major);
            let error = SigningError::ServiceError {
                major: diagnostic.major,
                minor: diagnostic.minor,
                message: diagnostic.message,
            };
            return Err(self.abort(pending, error));
        }

        // Apply
        let mut signed: Vec<(usize, PathBuf)> = Vec::with_capacity(pending.len());
        for ((index, handle), signature) in pending.into_iter().zip(&response.signatures) {
            let input = jobs[index].input.as_path();
            match handle.patch(signature) {
                Ok(output) => signed.push((index, output)),
                Err(e) => {
                    log::error!("Cannot apply signature to {}: {e}", input.display());
                    self.reporter.failed(&[input], &e.to_string());
                    outcomes[index] = DocumentOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            }
        }
        if signed.is_empty() {
            self.machine.fail();
            return Ok(self.report(jobs, outcomes, Some(response.diagnostic)));
        }
        self.machine.advance(SigningState::Signed)?;

        let mut merged_any = false;
        for (index, output) in &signed {
            let merged = match &response.revocation {
                Some(evidence) => match self.placeholder.merge_revocation(output, evidence) {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!("{}: {e}", output.display());
                        false
                    }
                },
                None => false,
            };
            merged_any |= merged;
            outcomes[*index] = DocumentOutcome::Signed {
                revocation_merged: merged,
            };
        }
        if merged_any {
            self.machine.advance(SigningState::RevocationMerged)?;
        }

        let outputs: Vec<&Path> = signed.iter().map(|(_, p)| p.as_path()).collect();
        self.reporter.signed(&outputs);
        Ok(self.report(jobs, outcomes, Some(response.diagnostic)))
    }

    fn abort(&mut self, pending: Vec<(usize, PendingSignature)>, error: SigningError) -> SigningError {
        log::error!("Batch aborted, no document modified: {error}");
        for (_, handle) in pending {
            handle.discard();
        }
        self.machine.fail();
        error
    }

    fn report(
        &self,
        jobs: &[SignJob],
        outcomes: Vec<DocumentOutcome>,
        diagnostic: Option<Diagnostic>,
    ) -> BatchReport {
        BatchReport {
            state: self.machine.state(),
            diagnostic,
            documents: jobs
                .iter()
                .cloned()
                .zip(outcomes)
                .map(|(job, outcome)| DocumentReport { job, outcome })
                .collect(),
        }
    }
}
