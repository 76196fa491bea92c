//! Request dispatch loop over a byte stream.
//!
//! One [`Detector`] session lives for the whole connection. Every decoded
//! request gets exactly one response; stage failures are reported to the
//! client and never end the loop.

use std::io::{BufRead, Write};

use common::Grid;

use crate::config::DetectionConfig;
use crate::detector::Detector;
use crate::error::{Error, Stage};
use crate::imaging::odd_window;
use crate::protocol::{ProtocolError, Request, Response};

pub struct Server {
    detector: Detector,
    config: DetectionConfig,
}

impl Server {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            detector: Detector::new(),
            config,
        }
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Serves requests until the reader is exhausted. Returns the number of
    /// requests answered.
    pub fn serve<R: BufRead, W: Write>(
        &mut self,
        mut reader: R,
        mut writer: W,
    ) -> Result<usize, ProtocolError> {
        let mut answered = 0;

        loop {
            let response = match Request::read_from(&mut reader) {
                Ok(None) => break,
                Ok(Some(request)) => self.handle(request),
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(error = %err, "Rejected malformed request");
                    Response::Error(err.to_string())
                }
                Err(err) => {
                    tracing::error!(error = %err, "Closing stream after unreadable request");
                    if !matches!(err, ProtocolError::Io(_)) {
                        Response::Error(err.to_string()).write_to(&mut writer)?;
                        writer.flush()?;
                    }
                    return Err(err);
                }
            };

            response.write_to(&mut writer)?;
            writer.flush()?;
            answered += 1;
        }

        tracing::info!(requests = answered, "Client stream closed");
        Ok(answered)
    }

    pub fn handle(&mut self, request: Request) -> Response {
        let opcode = request.opcode();
        tracing::debug!(?opcode, "Handling request");

        let result = match request {
            Request::ImageRequest => self
                .detector
                .image()
                .cloned()
                .map(Response::Image)
                .ok_or(Error::Precondition(Stage::Image)),
            Request::LoadFromFile(path) => self
                .detector
                .load_file(&path, Some(&self.config.pic))
                .map(|()| Response::Done),
            Request::LoadFromArray { rows, cols, pixels } => {
                self.detector.set_image(Grid::new(rows, cols, pixels));
                Ok(Response::Done)
            }
            Request::RunAlgorithm => {
                return Response::NotImplemented("run_algorithm is not implemented".to_string())
            }
            Request::Equalize => self.detector.equalize().map(|()| Response::Done),
            Request::CalculateBackground(window) => self
                .detector
                .calculate_background(odd_window(window))
                .map(|()| Response::Done),
            Request::CalculateSignal(window) => self
                .detector
                .calculate_signal(odd_window(window))
                .map(|()| Response::Done),
            Request::CalculateSignificance(sigma) => self
                .detector
                .calculate_significance(sigma)
                .map(|()| Response::Done),
            Request::Cluster => self
                .detector
                .cluster(&self.config.filter)
                .map(|outcome| Response::ClusterCount(outcome.kept.len() as u32)),
        };

        result.unwrap_or_else(|err| {
            tracing::warn!(?opcode, error = %err, "Request failed");
            Response::Error(err.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, Cursor, Read};
    use std::path::PathBuf;

    use super::*;
    use crate::imaging::save_gray_png;
    use crate::protocol::{read_u32, Status};

    fn plus_image() -> Grid<u8> {
        Grid::from_fn(5, 5, |r, c| {
            if (r == 2 && (1..4).contains(&c)) || (c == 2 && (1..4).contains(&r)) {
                255
            } else {
                0
            }
        })
    }

    fn stream(requests: &[Request]) -> Cursor<Vec<u8>> {
        let mut bytes = Vec::new();
        for request in requests {
            request.write_to(&mut bytes).unwrap();
        }
        Cursor::new(bytes)
    }

    fn read_status(reader: &mut impl Read) -> Status {
        Status::try_from(read_u32(reader).unwrap()).unwrap()
    }

    fn read_message(reader: &mut impl BufRead) -> String {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        line
    }

    #[test]
    fn test_full_session_over_buffers() {
        let image = plus_image();
        let requests = [
            Request::LoadFromArray {
                rows: 5,
                cols: 5,
                pixels: image.cells().to_vec(),
            },
            Request::ImageRequest,
            Request::Cluster,
            Request::RunAlgorithm,
        ];

        let mut server = Server::new(DetectionConfig::default());
        let mut out = Vec::new();
        let answered = server.serve(stream(&requests), &mut out).unwrap();
        assert_eq!(answered, 4);

        let mut reader = Cursor::new(out);
        assert_eq!(read_status(&mut reader), Status::Success);

        assert_eq!(read_status(&mut reader), Status::Success);
        let mut pixels = vec![0u8; 25];
        reader.read_exact(&mut pixels).unwrap();
        assert_eq!(pixels, image.cells());

        assert_eq!(read_status(&mut reader), Status::Success);
        assert_eq!(read_u32(&mut reader).unwrap(), 1);

        assert_eq!(read_status(&mut reader), Status::NotImplemented);
        assert!(read_message(&mut reader).ends_with('\n'));

        assert_eq!(reader.position() as usize, reader.get_ref().len());
    }

    #[test]
    fn test_stage_errors_keep_loop_alive() {
        let requests = [
            Request::Equalize,
            Request::CalculateSignificance(1.0),
            Request::LoadFromArray {
                rows: 3,
                cols: 3,
                pixels: vec![200; 9],
            },
            Request::CalculateBackground(4),
            Request::CalculateSignificance(1.0),
        ];

        let mut server = Server::new(DetectionConfig::default());
        let mut out = Vec::new();
        assert_eq!(server.serve(stream(&requests), &mut out).unwrap(), 5);

        let mut reader = Cursor::new(out);
        assert_eq!(read_status(&mut reader), Status::Error);
        assert!(read_message(&mut reader).contains("image not loaded"));
        assert_eq!(read_status(&mut reader), Status::Error);
        assert!(read_message(&mut reader).contains("background not calculated"));
        assert_eq!(read_status(&mut reader), Status::Success);
        // Even windows are bumped to the next odd size.
        assert_eq!(read_status(&mut reader), Status::Success);
        assert_eq!(read_status(&mut reader), Status::Error);
        assert!(read_message(&mut reader).contains("signal not calculated"));

        assert!(server.detector().background().is_some());
    }

    #[test]
    fn test_unknown_opcode_then_valid_request() {
        let mut bytes = 99u32.to_le_bytes().to_vec();
        Request::ImageRequest.write_to(&mut bytes).unwrap();

        let mut server = Server::new(DetectionConfig::default());
        let mut out = Vec::new();
        assert_eq!(server.serve(Cursor::new(bytes), &mut out).unwrap(), 2);

        let mut reader = Cursor::new(out);
        assert_eq!(read_status(&mut reader), Status::Error);
        assert!(read_message(&mut reader).contains("Unknown opcode 99"));
        assert_eq!(read_status(&mut reader), Status::Error);
    }

    #[test]
    fn test_truncated_request_aborts() {
        let mut bytes = 5u32.to_le_bytes().to_vec();
        bytes.push(1);

        let mut server = Server::new(DetectionConfig::default());
        let result = server.serve(Cursor::new(bytes), Vec::new());
        assert!(matches!(result, Err(ProtocolError::Io(_))));
    }

    #[test]
    fn test_negative_array_shape_closes_stream() {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&(-1i32).to_le_bytes());
        bytes.extend_from_slice(&3i32.to_le_bytes());
        bytes.extend_from_slice(&[7, 7, 7, 7]);

        let mut server = Server::new(DetectionConfig::default());
        let mut out = Vec::new();
        let result = server.serve(Cursor::new(bytes), &mut out);
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidArrayShape { rows: -1, cols: 3 })
        ));

        // Exactly one answer; the payload is never decoded as opcodes.
        let mut reader = Cursor::new(out);
        assert_eq!(read_status(&mut reader), Status::Error);
        assert!(read_message(&mut reader).contains("-1x3"));
        assert_eq!(reader.position() as usize, reader.get_ref().len());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plus.png");
        save_gray_png(&plus_image(), &path).unwrap();

        let requests = [
            Request::LoadFromFile(path),
            Request::LoadFromFile(PathBuf::from("/nonexistent/frame.png")),
        ];
        let mut server = Server::new(DetectionConfig::default());
        let mut out = Vec::new();
        server.serve(stream(&requests), &mut out).unwrap();

        let mut reader = Cursor::new(out);
        assert_eq!(read_status(&mut reader), Status::Success);
        assert_eq!(read_status(&mut reader), Status::Error);
        assert!(read_message(&mut reader).contains("/nonexistent/frame.png"));

        // A failed load leaves the previous frame in place.
        assert_eq!(server.detector().image(), Some(&plus_image()));
    }
}
