// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fustor_wire::{Request, Response};

use crate::client;
use crate::exit_error::ExitError;
use crate::output;

pub async fn status(server: &str, json: bool) -> Result<(), ExitError> {
    let response = client::call(server, Request::Status).await?;
    match response {
        Response::Status { uptime_secs, pipes, views, sessions } => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "uptime_secs": uptime_secs,
                        "pipes": pipes,
                        "views": views,
                        "sessions": sessions,
                    })
                );
            } else {
                println!("uptime:   {uptime_secs}s");
                println!("pipes:    {pipes}");
                println!("views:    {views}");
                println!("sessions: {sessions}");
            }
            Ok(())
        }
        other => Err(ExitError::new(2, format!("unexpected response: {other:?}"))),
    }
}

pub async fn sessions(server: &str, json: bool) -> Result<(), ExitError> {
    let response = client::call(server, Request::Sessions).await?;
    match response {
        Response::Sessions { sessions } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else {
                print!("{}", output::render_sessions(&sessions));
            }
            Ok(())
        }
        other => Err(ExitError::new(2, format!("unexpected response: {other:?}"))),
    }
}

pub async fn shutdown(server: &str) -> Result<(), ExitError> {
    let response = client::call(server, Request::Shutdown).await?;
    match response {
        Response::ShuttingDown => {
            println!("shutting down");
            Ok(())
        }
        other => Err(ExitError::new(2, format!("unexpected response: {other:?}"))),
    }
}
