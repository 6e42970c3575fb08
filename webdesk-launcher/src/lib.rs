//! # webdesk-launcher: browser access to a VNC desktop
//!
//! Sets up everything needed to reach this machine's desktop from a web
//! browser: checks that a VNC server is installed, fetches the noVNC web
//! client, starts the VNC server, and runs a WebSocket proxy that serves
//! noVNC and bridges it to the VNC port. Optionally exposes the proxy
//! through an ngrok tunnel.
//!
//! ## Steps
//!
//! - **Check**: required software present, else exit 1.
//! - **Setup**: on Windows, walk the operator through TightVNC settings.
//! - **Serve**: proxy until Ctrl-C; the VNC server keeps running afterwards.

pub mod config;
pub mod launcher;
