//! SOAP request serialization.
//!
//! Builds the `ais:sign` envelope for one `SigningRequest`. Element order
//! inside `OptionalInputs` is fixed by the service schema.

use crate::domain::constants::{
    MOBILE_ID_TYPE, NS_AIS, NS_DSIG, NS_DSS, NS_SC, NS_SOAP, REVOCATION_INFORMATION_BOTH,
    SIGNATURE_TYPE_TIMESTAMP, SIGN_REQUEST_PROFILE,
};
use crate::domain::mode::SignatureKind;
use crate::domain::request::SigningRequest;
use crate::infra::error::{SigningError, SigningResult};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

/// Thin wrapper keeping start/end pairs balanced.
struct XmlOut {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
        }
    }

    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> SigningResult<()> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> SigningResult<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> SigningResult<()> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Empty(start))?;
        Ok(())
    }

    fn text_element(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) -> SigningResult<()> {
        self.open(name, attributes)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn finish(self) -> SigningResult<String> {
        String::from_utf8(self.writer.into_inner().into_inner())
            .map_err(|e| SigningError::XmlError(format!("request is not UTF-8: {e}")))
    }
}

/// Serialize the SOAP envelope for `request`.
pub fn build_sign_request(request: &SigningRequest) -> SigningResult<String> {
    let mut xml = XmlOut::new();
    xml.writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    xml.open(
        "soap:Envelope",
        &[
            ("xmlns:soap", NS_SOAP),
            ("xmlns", NS_DSS),
            ("xmlns:dsig", NS_DSIG),
            ("xmlns:sc", NS_SC),
            ("xmlns:ais", NS_AIS),
        ],
    )?;
    xml.empty("soap:Header", &[])?;
    xml.open("soap:Body", &[])?;
    xml.open("ais:sign", &[])?;
    xml.open(
        "SignRequest",
        &[
            ("Profile", SIGN_REQUEST_PROFILE),
            ("RequestID", request.request_id().as_str()),
        ],
    )?;

    write_input_documents(&mut xml, request)?;
    write_optional_inputs(&mut xml, request)?;

    xml.close("SignRequest")?;
    xml.close("ais:sign")?;
    xml.close("soap:Body")?;
    xml.close("soap:Envelope")?;
    xml.finish()
}

fn write_input_documents(xml: &mut XmlOut, request: &SigningRequest) -> SigningResult<()> {
    let algorithm = request.digest_algorithm().xml_uri();
    let batch = request.batch_size() > 1;

    xml.open("InputDocuments", &[])?;
    for (index, digest) in request.document_digests().iter().enumerate() {
        let id = index.to_string();
        if batch {
            xml.open("DocumentHash", &[("ID", id.as_str())])?;
        } else {
            xml.open("DocumentHash", &[])?;
        }
        xml.empty("dsig:DigestMethod", &[("Algorithm", algorithm)])?;
        xml.text_element("dsig:DigestValue", &[], &digest.to_base64())?;
        xml.close("DocumentHash")?;
    }
    xml.close("InputDocuments")
}

fn write_optional_inputs(xml: &mut XmlOut, request: &SigningRequest) -> SigningResult<()> {
    xml.open("OptionalInputs", &[])?;

    for profile in request.additional_profiles() {
        xml.text_element("AdditionalProfile", &[], profile)?;
    }

    xml.open("ClaimedIdentity", &[])?;
    xml.text_element("Name", &[], request.claimed_identity())?;
    xml.close("ClaimedIdentity")?;

    if let Some(subject) = request.subject() {
        xml.open("sc:CertificateRequest", &[])?;
        xml.text_element("sc:DistinguishedName", &[], subject.as_str())?;
        if let Some(step_up) = request.step_up() {
            xml.open("sc:StepUpAuthorisation", &[])?;
            xml.open("sc:MobileID", &[("Type", MOBILE_ID_TYPE)])?;
            xml.text_element("sc:MSISDN", &[], step_up.msisdn())?;
            xml.text_element("sc:Message", &[], step_up.message())?;
            xml.text_element("sc:Language", &[], step_up.language().as_str())?;
            xml.close("sc:MobileID")?;
            xml.close("sc:StepUpAuthorisation")?;
        }
        xml.close("sc:CertificateRequest")?;
    }

    let kind = request.signature_kind();
    xml.text_element("SignatureType", &[], kind.urn())?;
    if kind != SignatureKind::Timestamp {
        xml.empty("AddTimestamp", &[("Type", SIGNATURE_TYPE_TIMESTAMP)])?;
    }
    xml.empty(
        "sc:AddRevocationInformation",
        &[("Type", REVOCATION_INFORMATION_BOTH)],
    )?;

    xml.close("OptionalInputs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::crypto::{DigestBytes, HashAlgorithm};
    use crate::domain::mode::{ModeInputs, SigningMode};
    use crate::domain::types::RequestId;

    fn digest(fill: u8) -> DigestBytes {
        DigestBytes::new(HashAlgorithm::Sha256, vec![fill; 32]).unwrap()
    }

    fn request(inputs: &ModeInputs, docs: usize) -> String {
        let mode = SigningMode::derive(inputs).unwrap();
        let identity = mode.claimed_identity("ACME", "kp1", "kp2");
        let digests = (0..docs).map(|i| digest(i as u8)).collect();
        let request = SigningRequest::new(RequestId::generate(), &mode, identity, digests).unwrap();
        build_sign_request(&request).unwrap()
    }

    #[test]
    fn test_static_single_document() {
        let xml = request(&ModeInputs::default(), 1);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(r#"xmlns="urn:oasis:names:tc:dss:1.0:core:schema""#));
        assert!(xml.contains(r#"<SignRequest Profile="http://ais.swisscom.ch/1.0" RequestID=""#));
        assert!(xml.contains("<DocumentHash><dsig:DigestMethod"));
        assert!(!xml.contains("AdditionalProfile"));
        assert!(xml.contains("<ClaimedIdentity><Name>ACME:kp1</Name></ClaimedIdentity>"));
        assert!(xml.contains("<SignatureType>urn:ietf:rfc:3369</SignatureType>"));
        assert!(xml.contains(r#"<AddTimestamp Type="urn:ietf:rfc:3161"/>"#));
        assert!(xml.contains(r#"<sc:AddRevocationInformation Type="BOTH"/>"#));
        assert!(!xml.contains("sc:CertificateRequest"));
    }

    #[test]
    fn test_timestamp_batch_profiles_and_ids() {
        let inputs = ModeInputs {
            timestamp: true,
            ..ModeInputs::default()
        };
        let xml = request(&inputs, 3);
        let timestamp = xml
            .find("<AdditionalProfile>urn:oasis:names:tc:dss:1.0:profiles:timestamping")
            .unwrap();
        let batch = xml
            .find("<AdditionalProfile>http://ais.swisscom.ch/1.0/profiles/batchprocessing")
            .unwrap();
        assert!(timestamp < batch);
        for id in 0..3 {
            assert!(xml.contains(&format!(r#"<DocumentHash ID="{id}">"#)));
        }
        assert!(xml.contains("<Name>ACME</Name>"));
        assert!(!xml.contains("<AddTimestamp"));
    }

    #[test]
    fn test_step_up_block_is_escaped() {
        let inputs = ModeInputs {
            distinguished_name: Some("cn=Hans Muster, c=CH".into()),
            msisdn: Some("+41791234567".into()),
            message: Some("Sign <doc> & go".into()),
            language: Some("de".into()),
            ..ModeInputs::default()
        };
        let xml = request(&inputs, 1);
        assert!(xml.contains("<sc:DistinguishedName>cn=Hans Muster, c=CH</sc:DistinguishedName>"));
        assert!(xml.contains(r#"<sc:MobileID Type="http://ais.swisscom.ch/1.0/auth/mobileid/1.0">"#));
        assert!(xml.contains("<sc:MSISDN>41791234567</sc:MSISDN>"));
        assert!(xml.contains("<sc:Message>Sign &lt;doc&gt; &amp; go</sc:Message>"));
        assert!(xml.contains("<sc:Language>de</sc:Language>"));
        assert!(xml.contains("<Name>ACME:kp2</Name>"));
    }
}
