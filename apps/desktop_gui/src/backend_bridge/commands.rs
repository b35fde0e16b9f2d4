//! Backend commands queued from UI to backend worker.

use std::path::PathBuf;

use client_core::StageRequest;
use shared::domain::SignatureId;

pub enum BackendCommand {
    RefreshLibrary,
    AddSignatures { paths: Vec<PathBuf> },
    DeleteSignature { id: SignatureId },
    RunStage(StageRequest),
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::RefreshLibrary => "refresh_library",
            BackendCommand::AddSignatures { .. } => "add_signatures",
            BackendCommand::DeleteSignature { .. } => "delete_signature",
            BackendCommand::RunStage(_) => "run_stage",
        }
    }
}
