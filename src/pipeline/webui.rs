//! Generator backed by a Stable-Diffusion-WebUI compatible HTTP API.

use std::io::Cursor;
use std::time::Duration;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{Generation, GenerationRequest, Generator};

/// Connection settings for [`WebUiGenerator`].
#[derive(Debug, Clone)]
pub struct WebUiConfig {
    /// Server root, e.g. `http://127.0.0.1:7860`.
    pub base_url: String,

    /// Per-request timeout. Generation can be slow, so keep this generous.
    pub timeout: Duration,

    /// Optional HTTP basic-auth `(user, password)`.
    pub credentials: Option<(String, String)>,
}

impl Default for WebUiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7860".to_string(),
            timeout: Duration::from_secs(600),
            credentials: None,
        }
    }
}

/// Calls `POST /sdapi/v1/img2img` once per generation.
pub struct WebUiGenerator {
    config: WebUiConfig,
    client: reqwest::blocking::Client,
}

impl WebUiGenerator {
    /// Create a new client for the given server.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: WebUiConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| Error::Request { source })?;

        tracing::info!("Using generation backend at {}", config.base_url);

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/sdapi/v1/img2img",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

impl Generator for WebUiGenerator {
    fn generate(&mut self, request: &GenerationRequest) -> Result<Generation> {
        let payload = Img2ImgPayload::from_request(request)?;

        tracing::debug!(
            "Submitting {} image(s) at {}x{}, seed {}",
            payload.init_images.len(),
            payload.width,
            payload.height,
            payload.seed
        );

        let mut http = self.client.post(self.endpoint()).json(&payload);
        if let Some((user, password)) = &self.config.credentials {
            http = http.basic_auth(user, Some(password));
        }

        let response = http.send().map_err(|source| Error::Request { source })?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|source| Error::Request { source })?;

        parse_response(status, &body, request.seed)
    }
}

/// Turn an img2img HTTP response into a [`Generation`].
///
/// The seed reported in `info` wins; `request_seed` is the fallback.
fn parse_response(
    status: reqwest::StatusCode,
    body: &str,
    request_seed: Option<u64>,
) -> Result<Generation> {
    if !status.is_success() {
        return Err(Error::Backend {
            status,
            body: body.to_string(),
        });
    }

    let body: Img2ImgResponse = serde_json::from_str(body).map_err(|err| Error::Payload {
        reason: format!("unexpected response body: {err}"),
    })?;

    if body.images.is_empty() {
        return Err(Error::NoImages);
    }

    let images = body
        .images
        .iter()
        .map(|payload| decode_image_payload(payload))
        .collect::<Result<Vec<_>>>()?;

    Ok(Generation {
        images,
        seed: seed_from_info(&body.info).or(request_seed),
        info: body.info,
    })
}

/// Request body for the img2img endpoint.
#[derive(Debug, Serialize)]
struct Img2ImgPayload<'a> {
    init_images: Vec<String>,
    prompt: &'a str,
    negative_prompt: &'a str,
    steps: u32,
    cfg_scale: f32,
    denoising_strength: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    sampler_name: Option<&'a str>,
    seed: i64,
    batch_size: u32,
    n_iter: u32,
    width: u32,
    height: u32,
    do_not_save_samples: bool,
    do_not_save_grid: bool,
    save_images: bool,
}

impl<'a> Img2ImgPayload<'a> {
    fn from_request(request: &'a GenerationRequest) -> Result<Self> {
        let first = request
            .init_images
            .first()
            .ok_or_else(|| Error::InvalidParameter {
                name: "init_images".to_string(),
                reason: "at least one input image is required".to_string(),
            })?;
        let (width, height) = first.dimensions();

        // -1 asks the server for a random seed
        let seed = match request.seed {
            Some(seed) => i64::try_from(seed).map_err(|_| Error::InvalidParameter {
                name: "seed".to_string(),
                reason: format!("must be at most {}", i64::MAX),
            })?,
            None => -1,
        };

        let init_images = request
            .init_images
            .iter()
            .map(encode_png)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            init_images,
            prompt: &request.prompt,
            negative_prompt: &request.negative_prompt,
            steps: request.steps,
            cfg_scale: request.cfg_scale,
            denoising_strength: request.denoising_strength,
            sampler_name: request.sampler_name.as_deref(),
            seed,
            batch_size: request.batch_size,
            n_iter: request.n_iter,
            width: request.width.unwrap_or(width),
            height: request.height.unwrap_or(height),
            do_not_save_samples: request.do_not_save_samples,
            do_not_save_grid: request.do_not_save_grid,
            save_images: !request.do_not_save_samples,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Img2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
    /// JSON document serialized as a string.
    #[serde(default)]
    info: String,
}

fn encode_png(img: &DynamicImage) -> Result<String> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .map_err(|source| Error::ImageEncode { source })?;
    Ok(BASE64_STANDARD.encode(buffer.into_inner()))
}

/// Decode a base64 image, with or without a `data:<mime>;base64,` prefix.
fn decode_image_payload(payload: &str) -> Result<DynamicImage> {
    let trimmed = payload.trim();
    let b64 = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            rest.split_once(";base64,")
                .ok_or_else(|| Error::Payload {
                    reason: "malformed data URI".to_string(),
                })?
                .1
        }
        None => trimmed,
    };

    let normalized: String = b64.chars().filter(|ch| !ch.is_whitespace()).collect();
    let bytes = BASE64_STANDARD
        .decode(normalized.as_bytes())
        .map_err(|err| Error::Payload {
            reason: format!("base64 decode failed: {err}"),
        })?;

    image::load_from_memory(&bytes).map_err(|err| Error::Payload {
        reason: format!("image decode failed: {err}"),
    })
}

fn seed_from_info(info: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(info).ok()?;
    value.get("seed")?.as_u64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::solid;

    #[test]
    fn test_payload_defaults_size_and_seed() {
        let request = GenerationRequest {
            init_images: vec![solid(64, 32, [9, 9, 9]); 2],
            batch_size: 2,
            ..GenerationRequest::default()
        };

        let payload = Img2ImgPayload::from_request(&request).unwrap();
        assert_eq!(payload.init_images.len(), 2);
        assert_eq!((payload.width, payload.height), (64, 32));
        assert_eq!(payload.seed, -1);
        assert!(payload.save_images);

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("sampler_name").is_none());
        assert_eq!(json["batch_size"], 2);
    }

    #[test]
    fn test_payload_respects_save_suppression() {
        let request = GenerationRequest {
            init_images: vec![solid(8, 8, [0, 0, 0])],
            seed: Some(42),
            width: Some(512),
            do_not_save_samples: true,
            do_not_save_grid: true,
            ..GenerationRequest::default()
        };

        let payload = Img2ImgPayload::from_request(&request).unwrap();
        assert_eq!(payload.seed, 42);
        assert_eq!((payload.width, payload.height), (512, 8));
        assert!(payload.do_not_save_samples);
        assert!(payload.do_not_save_grid);
        assert!(!payload.save_images);
    }

    #[test]
    fn test_payload_requires_input_image() {
        let request = GenerationRequest::default();
        assert!(matches!(
            Img2ImgPayload::from_request(&request),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_decode_plain_and_data_uri() {
        let encoded = encode_png(&solid(2, 3, [5, 6, 7])).unwrap();

        let plain = decode_image_payload(&encoded).unwrap();
        assert_eq!((plain.width(), plain.height()), (2, 3));

        let uri = format!("data:image/png;base64,{encoded}");
        let from_uri = decode_image_payload(&uri).unwrap();
        assert_eq!(from_uri.to_rgb8().get_pixel(1, 2).0, [5, 6, 7]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_image_payload("data:image/png,abc"),
            Err(Error::Payload { .. })
        ));
        assert!(matches!(
            decode_image_payload("!!!"),
            Err(Error::Payload { .. })
        ));
    }

    #[test]
    fn test_seed_from_info() {
        assert_eq!(seed_from_info(r#"{"seed": 3141, "all_seeds": [3141]}"#), Some(3141));
        assert_eq!(seed_from_info("not json"), None);
        assert_eq!(seed_from_info(""), None);
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let generator = WebUiGenerator::new(WebUiConfig {
            base_url: "http://localhost:7860/".to_string(),
            ..WebUiConfig::default()
        })
        .unwrap();
        assert_eq!(generator.endpoint(), "http://localhost:7860/sdapi/v1/img2img");
    }

    #[test]
    fn test_payload_rejects_out_of_range_seed() {
        let request = GenerationRequest {
            init_images: vec![solid(8, 8, [0, 0, 0])],
            seed: Some(u64::MAX),
            ..GenerationRequest::default()
        };
        assert!(matches!(
            Img2ImgPayload::from_request(&request),
            Err(Error::InvalidParameter { name, .. }) if name == "seed"
        ));
    }

    #[test]
    fn test_response_error_status_keeps_body() {
        let err = parse_response(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "CUDA out of memory",
            Some(1),
        )
        .unwrap_err();

        match err {
            Error::Backend { status, body } => {
                assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "CUDA out of memory");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_response_without_images() {
        let body = r#"{"images": [], "info": "{}"}"#;
        assert!(matches!(
            parse_response(reqwest::StatusCode::OK, body, None),
            Err(Error::NoImages)
        ));
    }

    #[test]
    fn test_response_seed_from_info_then_request() {
        let encoded = encode_png(&solid(2, 2, [1, 1, 1])).unwrap();
        let info = serde_json::to_string(r#"{"seed": 77}"#).unwrap();

        let reported = format!(r#"{{"images": ["{encoded}", "{encoded}"], "info": {info}}}"#);
        let generation = parse_response(reqwest::StatusCode::OK, &reported, Some(5)).unwrap();
        assert_eq!(generation.images.len(), 2);
        assert_eq!(generation.seed, Some(77));

        let silent = format!(r#"{{"images": ["{encoded}"]}}"#);
        let generation = parse_response(reqwest::StatusCode::OK, &silent, Some(5)).unwrap();
        assert_eq!(generation.seed, Some(5));
    }

    #[test]
    fn test_response_not_json() {
        assert!(matches!(
            parse_response(reqwest::StatusCode::OK, "<html>", None),
            Err(Error::Payload { .. })
        ));
    }
}
