//! Backend worker: a dedicated thread running a tokio runtime that owns the
//! stage and library clients.

use std::{path::PathBuf, sync::Arc, thread};

use client_core::{load_library, Backend, LibraryUpload, Settings, SignatureLibrary};
use crossbeam_channel::{Receiver, Sender};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

pub fn spawn_backend_thread(
    settings: Settings,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let backend = match Backend::from_settings(&settings) {
                Ok(backend) => Arc::new(backend),
                Err(err) => {
                    let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                        UiErrorContext::BackendStartup,
                        format!("backend worker startup failure: {err:#}"),
                    )));
                    tracing::error!("failed to build backend clients: {err:#}");
                    return;
                }
            };
            let _ = ui_tx.try_send(UiEvent::Info("Backend worker ready".to_string()));

            while let Ok(cmd) = cmd_rx.recv() {
                let backend = Arc::clone(&backend);
                let ui_tx = ui_tx.clone();
                match cmd {
                    BackendCommand::RefreshLibrary => {
                        tokio::spawn(async move { refresh_library(&backend, &ui_tx).await });
                    }
                    BackendCommand::AddSignatures { paths } => {
                        tokio::spawn(async move {
                            match read_uploads(paths).await {
                                Ok(files) => match backend.library.add(files).await {
                                    Ok(()) => refresh_library(&backend, &ui_tx).await,
                                    Err(err) => send_library_error(&ui_tx, &err),
                                },
                                Err(message) => {
                                    let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                        UiErrorContext::Library,
                                        message,
                                    )));
                                }
                            }
                        });
                    }
                    BackendCommand::DeleteSignature { id } => {
                        tokio::spawn(async move {
                            match backend.library.delete(id).await {
                                Ok(()) => {
                                    let _ = ui_tx.try_send(UiEvent::SignatureDeleted(id));
                                }
                                Err(err) => send_library_error(&ui_tx, &err),
                            }
                        });
                    }
                    BackendCommand::RunStage(request) => {
                        // Each stage runs on its own task; results apply in completion order.
                        tokio::spawn(async move {
                            let action = request.action;
                            let outcome = backend.workflow.execute(request).await;
                            let event = UiEvent::StageFinished { action, outcome };
                            let _ = tokio::task::spawn_blocking(move || {
                                deliver_stage_outcome(&ui_tx, event)
                            })
                            .await;
                        });
                    }
                }
            }
            tracing::info!("ui command channel closed; backend worker exiting");
        });
    });
}

/// Stage outcomes wait for room in the UI queue; the UI counts them to settle
/// its in-flight spinner.
fn deliver_stage_outcome(ui_tx: &Sender<UiEvent>, event: UiEvent) -> bool {
    match ui_tx.send(event) {
        Ok(()) => true,
        Err(_) => {
            tracing::warn!("ui event channel closed; dropping stage outcome");
            false
        }
    }
}

async fn refresh_library(backend: &Backend, ui_tx: &Sender<UiEvent>) {
    match load_library(&backend.library).await {
        Ok(entries) => {
            let _ = ui_tx.try_send(UiEvent::LibraryLoaded(entries));
        }
        Err(err) => send_library_error(ui_tx, &err),
    }
}

fn send_library_error(ui_tx: &Sender<UiEvent>, err: &client_core::LibraryError) {
    tracing::warn!("signature library call failed: {err}");
    let _ = ui_tx.try_send(UiEvent::Error(UiError::from_api(
        UiErrorContext::Library,
        err.to_api_error(),
    )));
}

async fn read_uploads(paths: Vec<PathBuf>) -> Result<Vec<LibraryUpload>, String> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| format!("failed to read '{}': {err}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "signature".to_string());
        let mime_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        files.push(LibraryUpload {
            file_name,
            mime_type,
            bytes,
        });
    }
    Ok(files)
}
