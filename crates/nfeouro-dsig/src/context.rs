#![forbid(unsafe_code)]

//! Signing context: which element to reference and with which algorithms.

use nfeouro_core::SignatureProfile;
use nfeouro_xml::ElementTarget;

/// Configuration for one signing operation.
#[derive(Debug, Clone, Default)]
pub struct DsigContext {
    /// Element whose `Id` the reference points at.
    pub target: ElementTarget,
    pub profile: SignatureProfile,
}

impl DsigContext {
    pub fn new(target: ElementTarget, profile: SignatureProfile) -> Self {
        Self { target, profile }
    }

    pub fn with_target(mut self, target: ElementTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_profile(mut self, profile: SignatureProfile) -> Self {
        self.profile = profile;
        self
    }
}
