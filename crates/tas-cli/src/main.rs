use anyhow::{Context, Result};
use crossbeam_channel as channel;
use tas_core::prelude::*;
use tas_host::{EditorCommand, EditorEvent, SessionRuntime};

fn main() -> Result<()> {
    env_logger::init();

    // Optional project file: loaded if present, written back on exit
    let project_path = std::env::args().nth(1);

    let session = EditingSession::new(
        Box::new(ReferenceEngine::new()),
        InputKind::TwoPlayers,
        120,
        SessionConfig::default(),
    );

    let (command_tx, command_rx) = channel::unbounded();
    let (event_tx, event_rx) = channel::unbounded();
    let mut runtime = SessionRuntime::new(
        session,
        Box::new(MemoryClipboard::new()),
        command_rx,
        event_tx,
    );

    if let Some(path) = &project_path
        && let Ok(bytes) = std::fs::read(path)
    {
        log::info!("loading project from {path}");
        command_tx.send(EditorCommand::LoadProject(bytes)).ok();
    }

    // A small scripted editing session to exercise the runtime end to end
    command_tx.send(EditorCommand::SetRegionStride {
        start: 10,
        end: 40,
        stride: 2,
    })?;
    command_tx.send(EditorCommand::ColumnSet {
        pad: 0,
        button: JoypadButtons::BUTTON_A,
    })?;
    command_tx.send(EditorCommand::ClearSelection)?;
    command_tx.send(EditorCommand::SetMarker(10))?;
    command_tx.send(EditorCommand::SubmitInputChange {
        frame: 200,
        target: tas_core::batch::EditTarget::Joypad(1),
        bits: JoypadButtons::START.bits(),
    })?;
    command_tx.send(EditorCommand::ApplyInputChanges("demo".into()))?;
    command_tx.send(EditorCommand::Jump(180))?;

    // Host loop: one tick per iteration until playback settles
    let mut ticks = 0usize;
    loop {
        runtime.tick();
        ticks += 1;

        for event in event_rx.try_iter() {
            match event {
                EditorEvent::Log(message) => log::info!("{message}"),
                EditorEvent::CursorMoved(frame) => log::debug!("cursor at {frame}"),
                EditorEvent::SeekFinished(frame) => log::info!("seek finished at {frame}"),
                EditorEvent::Error(message) => log::error!("{message}"),
                EditorEvent::ProjectSerialized(bytes) => {
                    if let Some(path) = &project_path {
                        std::fs::write(path, &bytes)
                            .with_context(|| format!("writing project to {path}"))?;
                        log::info!("project saved to {path} ({} bytes)", bytes.len());
                    }
                }
            }
        }

        let playback = runtime.session().playback();
        if !playback.is_seeking() && playback.state() == PlaybackState::Stopped {
            break;
        }
        if ticks > 10_000 {
            log::warn!("bailing out of host loop after {ticks} ticks");
            break;
        }
    }

    let session = runtime.session();
    let lag_frames = (0..session.greenzone().green_count())
        .filter(|&f| session.greenzone().was_lagged(f) == Some(true))
        .count();
    log::info!(
        "timeline {} frames, cursor {}, greenzone {} frames ({} snapshots, {} lag), {} marker(s)",
        session.timeline().len(),
        session.playback().cursor(),
        session.greenzone().green_count(),
        session.greenzone().stored_count(),
        lag_frames,
        session.markers().marker_count(),
    );

    if session.is_dirty() && project_path.is_some() {
        command_tx.send(EditorCommand::SaveProject)?;
        runtime.tick();
        for event in event_rx.try_iter() {
            if let EditorEvent::ProjectSerialized(bytes) = event
                && let Some(path) = &project_path
            {
                std::fs::write(path, &bytes)
                    .with_context(|| format!("writing project to {path}"))?;
                log::info!("project saved to {path} ({} bytes)", bytes.len());
            }
        }
    }

    Ok(())
}
