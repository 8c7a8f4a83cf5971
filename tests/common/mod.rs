#![allow(dead_code)]

use std::sync::Arc;

use stackrun::cloud::{Client, StaticCredential};
use stackrun::exec::CommandSpec;

pub const TOKEN: &str = "test-token";
pub const ORG: &str = "org-1";

/// `sh -c <script>`
pub fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("sh", ["-c", script])
}

pub fn client(base_url: &str) -> Client {
    Client::new(base_url, Arc::new(StaticCredential::new(TOKEN))).expect("build client")
}

pub fn client_with_token(base_url: &str, token: &str) -> Client {
    Client::new(base_url, Arc::new(StaticCredential::new(token))).expect("build client")
}

/// Long-lived command that acknowledges every SIGINT but never exits on its own.
pub const TRAP_LOOP: &str = "trap 'echo interrupt' INT; echo ready; while :; do sleep 0.1; done";
