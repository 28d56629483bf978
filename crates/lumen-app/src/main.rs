// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::Result;
use clap::Parser;
use lumen_core::init_tracing;
use lumen_platform::winit::event_loop::EventLoop;
use tracing::info;

mod app;
mod config;
mod scene;

use app::FirstApp;
use config::{AppConfig, Args};

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = AppConfig::load(&args.config);
    cfg.apply_args(&args);
    info!(
        "window {}x{}, mailbox preferred: {}, {} model(s)",
        cfg.window.width,
        cfg.window.height,
        cfg.render.prefer_mailbox,
        cfg.scene.models.len()
    );

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = FirstApp::new(cfg);
    event_loop.run_app(&mut app)?;

    match app.take_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
