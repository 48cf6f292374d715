//! Throwaway certificates and CMS signatures generated at test time.

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use openssl::stack::Stack;
use openssl::x509::extension::{BasicConstraints, SubjectAlternativeName};
use openssl::x509::{X509Builder, X509NameBuilder, X509};

pub struct Issued {
    pub cert: X509,
    pub key: PKey<Private>,
}

fn build(cn: &str, issuer: Option<&Issued>, ca: bool, dns: Option<&str>) -> Issued {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(rand::random::<u32>() >> 1).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    builder
        .set_issuer_name(issuer.map_or(&name, |i| i.cert.subject_name()))
        .unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder.set_pubkey(&key).unwrap();
    if ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
    }
    if let Some(dns) = dns {
        let san = SubjectAlternativeName::new()
            .dns(dns)
            .build(&builder.x509v3_context(issuer.map(|i| i.cert.as_ref()), None))
            .unwrap();
        builder.append_extension(san).unwrap();
    }
    builder
        .sign(issuer.map_or(&key, |i| &i.key), MessageDigest::sha256())
        .unwrap();
    Issued {
        cert: builder.build(),
        key,
    }
}

/// Root, intermediate and a server leaf for `host`.
pub struct ServerPki {
    pub root: Issued,
    pub intermediate: Issued,
    pub leaf: Issued,
}

impl ServerPki {
    pub fn new(host: &str) -> Self {
        let root = build("Fixture Root CA", None, true, None);
        let intermediate = build("Fixture SSL CA", Some(&root), true, None);
        let leaf = build(host, Some(&intermediate), false, Some(host));
        Self {
            root,
            intermediate,
            leaf,
        }
    }

    /// Leaf and intermediate, as a server sends them.
    pub fn presented_chain(&self) -> Vec<Vec<u8>> {
        vec![
            self.leaf.cert.to_der().unwrap(),
            self.intermediate.cert.to_der().unwrap(),
        ]
    }
}

/// Self-signed client identity in PEM.
pub fn client_identity_pem() -> (Vec<u8>, Vec<u8>) {
    let client = build("fixture client", None, false, None);
    (
        client.cert.to_pem().unwrap(),
        client.key.private_key_to_pem_pkcs8().unwrap(),
    )
}

/// Detached CMS signature over `data` by a throwaway signer.
pub fn detached_cms(data: &[u8]) -> Vec<u8> {
    let signer = build("Fixture Signer", None, false, None);
    let certs = Stack::new().unwrap();
    Pkcs7::sign(
        &signer.cert,
        &signer.key,
        &certs,
        data,
        Pkcs7Flags::DETACHED | Pkcs7Flags::BINARY,
    )
    .unwrap()
    .to_der()
    .unwrap()
}

/// DER tag-length-value with a definite length.
fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes: Vec<u8> = len.to_be_bytes().into_iter().skip_while(|b| *b == 0).collect();
        out.push(0x80 | bytes.len() as u8);
        out.extend_from_slice(&bytes);
    }
    out.extend_from_slice(content);
    out
}

fn utc_time(time: chrono::DateTime<chrono::Utc>) -> Vec<u8> {
    tlv(0x17, time.format("%y%m%d%H%M%SZ").to_string().as_bytes())
}

/// Empty v2 CRL issued and signed by `issuer` (sha256WithRSAEncryption).
pub fn signed_crl(issuer: &Issued) -> Vec<u8> {
    const SHA256_WITH_RSA: &[u8] = &[
        0x30, 0x0D, 0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B, 0x05, 0x00,
    ];
    let now = chrono::Utc::now();
    let mut tbs = tlv(0x02, &[0x01]);
    tbs.extend_from_slice(SHA256_WITH_RSA);
    tbs.extend_from_slice(&issuer.cert.subject_name().to_der().unwrap());
    tbs.extend_from_slice(&utc_time(now));
    tbs.extend_from_slice(&utc_time(now + chrono::Duration::days(7)));
    let tbs = tlv(0x30, &tbs);

    let mut signer = Signer::new(MessageDigest::sha256(), &issuer.key).unwrap();
    signer.update(&tbs).unwrap();
    let mut bits = vec![0x00];
    bits.extend_from_slice(&signer.sign_to_vec().unwrap());

    let mut crl = tbs;
    crl.extend_from_slice(SHA256_WITH_RSA);
    crl.extend_from_slice(&tlv(0x03, &bits));
    tlv(0x30, &crl)
}

/// Throwaway CA usable as a CRL issuer.
pub fn crl_issuer() -> Issued {
    build("Fixture CRL Issuer", None, true, None)
}
