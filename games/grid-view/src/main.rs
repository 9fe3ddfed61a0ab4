//! Reference View: a strict follower that draws one snapshot per Master
//! notification and never races ahead of it.

mod render;
mod terminal;

use backbone_lib::state::StateRegion;
use backbone_lib::sync::{ReaderGuard, SyncRegion};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::terminal::TerminalGuard;

#[derive(Parser, Debug)]
#[command(name = "grid-view")]
struct Args {
    width: u16,
    height: u16,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=warn", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let state = StateRegion::open(args.width, args.height).expect("opening /game_state");
    let sync = SyncRegion::open().expect("opening /game_sync");
    let _terminal = TerminalGuard::enter().expect("entering alternate screen");

    loop {
        sync.wait_for_notification();

        if state.header().game_over {
            let _ = render::draw(state.header(), state.board());
            sync.acknowledge_view();
            tracing::debug!("final snapshot drawn, exiting");
            return;
        }

        {
            let _reader = ReaderGuard::enter(&sync);
            let _ = render::draw(state.header(), state.board());
        }
        sync.acknowledge_view();
    }
}
