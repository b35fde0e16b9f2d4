use anyhow::{Context, Result};

pub mod blob;
pub mod config;
pub mod credential;
pub mod error;
pub mod geometry;
pub mod lane;
pub mod library;
pub mod render;
pub mod selection;
pub mod stage;
pub mod workbench;
pub mod workflow;

#[cfg(test)]
#[path = "tests/stage_server.rs"]
pub(crate) mod stage_server;

pub use config::{load_settings, RegionUnits, Settings};
pub use error::{CredentialError, ImageError, LibraryError, WorkflowError};
pub use library::{load_library, HttpSignatureLibrary, LibraryEntry, LibraryUpload, SignatureLibrary};
pub use stage::{HttpStageTransport, StageRequest, StageResponse, StageTransport};
pub use workbench::{ResultsPanel, Workbench};
pub use workflow::{prepare, WorkflowOrchestrator};

/// The two remote services, wired from settings.
pub struct Backend {
    pub workflow: WorkflowOrchestrator<HttpStageTransport>,
    pub library: HttpSignatureLibrary,
}

impl Backend {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = settings.request_timeout();
        let transport = HttpStageTransport::new(settings.stage_url.as_str(), timeout)
            .context("failed to build stage client")?;
        let library =
            HttpSignatureLibrary::new(&settings.library_url, settings.token_source(), timeout)
                .context("failed to build signature library client")?;
        tracing::info!(
            stage_url = %settings.stage_url,
            library_url = %settings.library_url,
            "backend clients ready"
        );
        Ok(Self {
            workflow: WorkflowOrchestrator::new(transport),
            library,
        })
    }

    /// A fresh workbench configured the same way as the clients.
    pub fn workbench(settings: &Settings) -> Workbench {
        Workbench::new(settings.clear_region_units)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
