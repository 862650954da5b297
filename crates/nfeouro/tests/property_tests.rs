//! Property-based tests for the signing pipeline

use nfeouro::xml::{normalize, ElementTarget, XmlWriter};
use nfeouro::{CredentialSource, DaoSigner};
use proptest::prelude::*;
use secrecy::SecretString;

fn source() -> CredentialSource {
    CredentialSource::new(
        format!(
            "{}/../../test-data/credentials/a1-3des.p12",
            env!("CARGO_MANIFEST_DIR")
        ),
        SecretString::from("senha1"),
    )
}

fn document(id: &str, name: &str) -> String {
    let mut w = XmlWriter::new();
    w.start_element("DAO", &[("xmlns", "http://www.sped.fazenda.gov.br/nfeouro")]);
    w.start_element("infDAO", &[("Id", id)]);
    w.text_element("xNome", name).unwrap();
    w.end_element("infDAO").unwrap();
    w.end_element("DAO").unwrap();
    w.into_string().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Every signed document verifies with the signer's certificate
    #[test]
    fn signed_documents_verify(
        id in "[A-Z][A-Za-z0-9]{0,30}",
        name in "[A-Za-z0-9 &<>çãéÔ'\"]{0,40}",
    ) {
        let signer = DaoSigner::default();
        let signed = signer.sign(&document(&id, &name), &source()).unwrap();
        prop_assert!(signer.verify(&signed.xml, &signed.certificate).unwrap());
        let expected_reference = format!("#{id}");
        let doc = roxmltree::Document::parse(&signed.xml).unwrap();
        let reference = doc
            .descendants()
            .find(|n| n.has_tag_name(("http://www.w3.org/2000/09/xmldsig#", "Reference")))
            .unwrap();
        prop_assert_eq!(reference.attribute("URI"), Some(expected_reference.as_str()));
    }

    /// Changing signed content breaks verification
    #[test]
    fn content_changes_are_detected(name in "[A-Za-z0-9 ]{1,40}") {
        let signer = DaoSigner::default();
        let signed = signer.sign(&document("ID1", &name), &source()).unwrap();
        let tampered = signed
            .xml
            .replace(&format!("<xNome>{name}</xNome>"), &format!("<xNome>{name}X</xNome>"));
        prop_assert!(signer.verify(&tampered, &signed.certificate).is_err());
    }

    /// Normalized text carries no line breaks or tabs
    #[test]
    fn normalize_strips_breaks(raw in "\\PC*[\r\n\t]\\PC*") {
        let normalized = normalize(&raw);
        prop_assert!(!normalized.contains(['\r', '\n', '\t']));
        prop_assert_eq!(normalize(&normalized), normalized.clone());
    }
}

#[test]
fn local_target_signs_plain_documents() {
    let signer = DaoSigner::default().with_target(ElementTarget::local("infDAO"));
    let signed = signer
        .sign(r#"<DAO><infDAO Id="ID1"><a>1</a></infDAO></DAO>"#, &source())
        .unwrap();
    assert!(signer.verify(&signed.xml, &signed.certificate).unwrap());
}
