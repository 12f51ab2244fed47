mod cli;
mod codec;
mod element;
mod error;
mod format;
mod index;
mod navigator;
mod record;
#[cfg(test)]
mod test_utils;
mod ui;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use winit::event_loop::EventLoop;

use crate::cli::Cli;
use crate::codec::StandardCodec;
use crate::element::ElementPool;
use crate::index::DirectoryIndex;
use crate::navigator::Navigator;
use crate::ui::state::ViewerState;
use crate::ui::App;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let target = cli.path.unwrap_or_else(|| PathBuf::from("."));
    let index = DirectoryIndex::default().with_follow_links(cli.follow_links);
    let mut navigator = Navigator::new(
        index,
        Box::new(StandardCodec),
        Box::new(ElementPool::default()),
    );

    match navigator.open(&target).map(|element| element.is_some()) {
        Ok(true) => {}
        Ok(false) => log::info!(
            "nothing to show yet in {}",
            navigator.index().working_directory().display()
        ),
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("could not create event loop: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let initial_delay = cli.initial_delay as f64 / 1000.0;
    let repeat_delay = cli.repeat_delay as f64 / 1000.0;
    let state = ViewerState::new(navigator, initial_delay, repeat_delay);
    let mut app = App::new(state);

    let result = event_loop.run_app(&mut app);
    if let Err(e) = app.state.navigator.shutdown() {
        log::warn!("{}", e);
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("event loop failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
