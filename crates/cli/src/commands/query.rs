// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fustor_core::ViewId;
use fustor_wire::{Request, Response};

use crate::client;
use crate::exit_error::ExitError;
use crate::output;

pub async fn tree(
    server: &str,
    view: &str,
    path: &str,
    recursive: bool,
    max_depth: Option<usize>,
    only_path: bool,
    json: bool,
) -> Result<(), ExitError> {
    let response = client::call(
        server,
        Request::Tree {
            view_id: ViewId::new(view),
            path: Some(path.to_string()),
            recursive,
            max_depth,
            only_path,
        },
    )
    .await?;
    match response {
        Response::Tree { root } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&root)?);
            } else {
                print!("{}", output::render_tree(&root, only_path));
            }
            Ok(())
        }
        other => Err(ExitError::new(2, format!("unexpected response: {other:?}"))),
    }
}

pub async fn stats(server: &str, view: &str, json: bool) -> Result<(), ExitError> {
    let response = client::call(server, Request::Stats { view_id: ViewId::new(view) }).await?;
    match response {
        Response::Stats { stats } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!("{}", output::render_stats(&stats));
            }
            Ok(())
        }
        other => Err(ExitError::new(2, format!("unexpected response: {other:?}"))),
    }
}
