//! One DSS round trip: serialize, exchange, parse.

use super::client::SigningTransport;
use crate::domain::request::SigningRequest;
use crate::domain::response::SigningResponse;
use crate::infra::error::SigningResult;
use crate::services::{build_sign_request, parse_signing_response};

/// Send `request` over `transport` and parse the answer for its batch size.
pub fn round_trip(
    transport: &dyn SigningTransport,
    request: &SigningRequest,
) -> SigningResult<SigningResponse> {
    let body = build_sign_request(request)?;
    log::debug!("Request {}:\n{body}", request.request_id());

    let answer = transport.exchange(&body)?;
    log::debug!("Response to {}:\n{answer}", request.request_id());

    parse_signing_response(&answer, request.signature_kind(), request.batch_size())
}
