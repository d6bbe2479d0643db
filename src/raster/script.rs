//! Playwright worker script, preflight checks, and error mapping.

use crate::{DcovError, Result};
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Long-lived worker: launches chromium once, then renders one request per
/// stdin line and answers with one JSON line on stdout.
pub(crate) const WORKER_SCRIPT: &str = r#"
const [, headlessFlag] = process.argv;
const readline = require('readline');

function send(msg) {
  process.stdout.write(JSON.stringify(msg) + '\n');
}

function errorMessage(err) {
  return err && err.message ? err.message : String(err);
}

async function main() {
  let browser;
  try {
    const { chromium } = require('playwright');
    browser = await chromium.launch({ headless: headlessFlag !== '0' });
  } catch (err) {
    send({ status: 'error', id: 0, message: errorMessage(err) });
    process.exit(1);
  }

  send({ status: 'ready', id: 0 });

  const rl = readline.createInterface({ input: process.stdin, terminal: false });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let req;
    try {
      req = JSON.parse(line);
    } catch (err) {
      send({ status: 'error', id: 0, message: 'invalid request: ' + errorMessage(err) });
      continue;
    }
    if (req.cmd === 'close') break;

    let context;
    try {
      context = await browser.newContext({
        viewport: { width: req.width, height: req.height },
        deviceScaleFactor: 1
      });
      const page = await context.newPage();
      await page.setContent(req.html, { waitUntil: 'networkidle', timeout: req.timeoutMs });
      const buffer = await page.screenshot({ type: 'png', fullPage: false });
      send({ status: 'ok', id: req.id, png: buffer.toString('base64') });
    } catch (err) {
      send({ status: 'error', id: req.id, message: errorMessage(err) });
    } finally {
      if (context) {
        await context.close().catch(() => {});
      }
    }
  }

  await browser.close();
}

main();
"#;

/// Timeout for checking node/playwright availability.
pub(crate) const NODE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

const PLAYWRIGHT_CHECK_SCRIPT: &str = "require('playwright'); process.stdout.write('ok');";

const MISSING_PLAYWRIGHT: &str =
    "Playwright npm package is missing; install with `npm install playwright`.";

pub(crate) fn map_spawn_error(err: io::Error, command: &str) -> DcovError {
    if err.kind() == io::ErrorKind::NotFound {
        DcovError::WorkerLifecycle(format!(
            "Unable to spawn render worker; '{}' was not found on PATH",
            command
        ))
    } else {
        DcovError::WorkerLifecycle(format!("Unable to spawn render worker: {err}"))
    }
}

/// Map a worker-side failure message to a lifecycle error with a hint.
pub(crate) fn map_worker_error(message: &str) -> DcovError {
    if message
        .to_ascii_lowercase()
        .contains("cannot find module 'playwright'")
    {
        return DcovError::WorkerLifecycle(MISSING_PLAYWRIGHT.to_string());
    }
    if message.to_ascii_lowercase().contains("executable doesn't exist") {
        return DcovError::WorkerLifecycle(format!(
            "chromium executable is missing; run `npx playwright install chromium` ({})",
            message.trim()
        ));
    }
    DcovError::WorkerLifecycle(format!("Render worker failed: {}", message.trim()))
}

pub(crate) async fn ensure_node_available(node_command: &str) -> Result<()> {
    let mut cmd = Command::new(node_command);
    cmd.arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let status = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.status())
        .await
        .map_err(|_| {
            DcovError::WorkerLifecycle(format!(
                "Timed out checking node availability after {:?}",
                NODE_CHECK_TIMEOUT
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !status.success() {
        return Err(DcovError::WorkerLifecycle(format!(
            "Node command {:?} is not available (exit {})",
            node_command, status
        )));
    }

    Ok(())
}

pub(crate) async fn ensure_playwright_available(
    node_command: &str,
    working_dir: Option<&Path>,
) -> Result<()> {
    let mut cmd = Command::new(node_command);
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }
    cmd.arg("-e")
        .arg(PLAYWRIGHT_CHECK_SCRIPT)
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let output = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.output())
        .await
        .map_err(|_| {
            DcovError::WorkerLifecycle(format!(
                "Timed out checking Playwright availability after {:?}",
                NODE_CHECK_TIMEOUT
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !output.status.success() {
        return Err(map_worker_error(&String::from_utf8_lossy(&output.stderr)));
    }

    Ok(())
}
