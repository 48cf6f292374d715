//! Centralized URNs, namespaces and PDF names shared by the request builder,
//! the response parser and the placeholder manager.
//! Keep this intentionally small; only broadly reused literals should live here.

// === XML namespaces ===

/// Default namespace of the DSS core schema
pub const NS_DSS: &str = "urn:oasis:names:tc:dss:1.0:core:schema";

/// XML digital signature namespace (`dsig` prefix)
pub const NS_DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Service schema extensions (`sc` prefix)
pub const NS_SC: &str = "http://ais.swisscom.ch/1.0/schema";

/// Service operation namespace (`ais` prefix)
pub const NS_AIS: &str = "http://service.ais.swisscom.com/";

/// SOAP 1.1 envelope (`soap` prefix)
pub const NS_SOAP: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// `Profile` attribute of every `SignRequest`
pub const SIGN_REQUEST_PROFILE: &str = "http://ais.swisscom.ch/1.0";

// === Additional profiles ===

pub const PROFILE_ASYNC: &str = "urn:oasis:names:tc:dss:1.0:profiles:asynchronousprocessing";
pub const PROFILE_BATCH: &str = "http://ais.swisscom.ch/1.0/profiles/batchprocessing";
pub const PROFILE_ON_DEMAND: &str = "http://ais.swisscom.ch/1.0/profiles/ondemandcertificate";
pub const PROFILE_TIMESTAMP: &str = "urn:oasis:names:tc:dss:1.0:profiles:timestamping";

// === Signature types ===

/// CMS detached signature
pub const SIGNATURE_TYPE_CMS: &str = "urn:ietf:rfc:3369";

/// RFC 3161 timestamp token
pub const SIGNATURE_TYPE_TIMESTAMP: &str = "urn:ietf:rfc:3161";

/// Step-up authorisation through Mobile ID
pub const MOBILE_ID_TYPE: &str = "http://ais.swisscom.ch/1.0/auth/mobileid/1.0";

/// Revocation information for both OCSP and CRL
pub const REVOCATION_INFORMATION_BOTH: &str = "BOTH";

// === Result codes ===

pub const RESULT_MAJOR_SUCCESS: &str = "urn:oasis:names:tc:dss:1.0:resultmajor:Success";
pub const RESULT_MAJOR_PENDING: &str =
    "urn:oasis:names:tc:dss:1.0:profiles:asynchronousprocessing:resultmajor:Pending";

// === Response payload elements ===

/// Element carrying a CMS signature
pub const TAG_CMS_SIGNATURE: &str = "Base64Signature";

/// Element carrying an RFC 3161 token
pub const TAG_TIMESTAMP_TOKEN: &str = "RFC3161TimeStampToken";

// === PDF signature dictionary names ===

pub const PDF_FILTER: &str = "Adobe.PPKLite";
pub const PDF_SUBFILTER_CMS: &str = "adbe.pkcs7.detached";
pub const PDF_SUBFILTER_TIMESTAMP: &str = "ETSI.RFC3161";

// === Reserved signature sizes (bytes of DER before hex encoding) ===

pub const ESTIMATED_SIZE_TIMESTAMP: usize = 10_000;
pub const ESTIMATED_SIZE_SIGNATURE: usize = 22_000;
