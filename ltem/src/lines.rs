//! Line-oriented batch frontend.
//!
//! Reads whitespace-separated requests of the form `path L d sigma` until
//! the input ends and answers each with a text report. `L` and `d` are the
//! background and signal blur windows; even values are bumped to odd ones.
//! A request that fails still gets an (empty) report so the caller never
//! waits forever. `.pic` frames are normalized by their own brightest
//! clipped sample.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::config::{DetectionConfig, PicFormat, PicScaling};
use crate::detector::detect_file;
use crate::imaging::odd_window;
use crate::report::{write_empty_report, write_report};

const TOKENS_PER_REQUEST: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct LineRequest {
    pub path: PathBuf,
    pub background_window: usize,
    pub signal_window: usize,
    pub sigma: f64,
}

impl LineRequest {
    /// Parses the four tokens of one request.
    pub fn parse(tokens: &[String]) -> Result<Self, String> {
        let [path, background, signal, sigma] = tokens else {
            return Err(format!(
                "expected {} tokens, got {}",
                TOKENS_PER_REQUEST,
                tokens.len()
            ));
        };

        let window = |name: &str, text: &str| {
            text.parse::<usize>()
                .map(odd_window)
                .map_err(|e| format!("invalid {} '{}': {}", name, text, e))
        };

        Ok(Self {
            path: PathBuf::from(path),
            background_window: window("L", background.as_str())?,
            signal_window: window("d", signal.as_str())?,
            sigma: sigma
                .parse()
                .map_err(|e| format!("invalid sigma '{}': {}", sigma, e))?,
        })
    }

    /// `base` with this request's windows and sensitivity, reading `.pic`
    /// frames with [`PicScaling::FrameMax`].
    pub fn apply(&self, base: &DetectionConfig) -> DetectionConfig {
        DetectionConfig {
            background_window: self.background_window,
            signal_window: self.signal_window,
            sigma: self.sigma,
            pic: PicFormat {
                scaling: PicScaling::FrameMax,
                ..base.pic
            },
            ..base.clone()
        }
    }
}

/// Processes requests from `reader` until EOF. Returns the number of
/// reports written.
pub fn run_lines<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    config: &DetectionConfig,
) -> io::Result<usize> {
    let mut tokens: VecDeque<String> = VecDeque::new();
    let mut reports = 0;

    for line in reader.lines() {
        tokens.extend(line?.split_whitespace().map(str::to_owned));

        while tokens.len() >= TOKENS_PER_REQUEST {
            let request: Vec<String> = tokens.drain(..TOKENS_PER_REQUEST).collect();
            answer(&request, writer, config)?;
            reports += 1;
        }
    }

    if !tokens.is_empty() {
        tracing::warn!(leftover = tokens.len(), "Input ended inside a request");
    }

    tracing::info!(reports, "Line input exhausted");
    Ok(reports)
}

fn answer<W: Write>(tokens: &[String], writer: &mut W, config: &DetectionConfig) -> io::Result<()> {
    let request = match LineRequest::parse(tokens) {
        Ok(request) => request,
        Err(message) => {
            tracing::warn!(%message, "Malformed request");
            return write_empty_report(writer);
        }
    };

    match detect_file(&request.path, &request.apply(config)) {
        Ok(report) => write_report(writer, &report.outcome.kept),
        Err(err) => {
            tracing::warn!(path = %request.path.display(), error = %err, "Request failed");
            write_empty_report(writer)
        }
    }
}
