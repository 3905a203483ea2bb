use serde::Serialize;

/// What a key (or a whole keyring) can be used for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Features {
    pub valid: bool,
    pub signing: bool,
    pub encryption: bool,
}

/// Features plus the diagnostics collected while probing them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeaturesChecked {
    #[serde(flatten)]
    pub features: Features,
    pub error: Option<String>,
}

impl FeaturesChecked {
    pub fn valid(&self) -> bool {
        self.features.valid
    }

    pub fn signing(&self) -> bool {
        self.features.signing
    }

    pub fn encryption(&self) -> bool {
        self.features.encryption
    }

    /// Combine per-key features into keyring features.
    ///
    /// Valid only if every member is valid; signing and encryption only if
    /// there is at least one member and every member supports them.
    pub fn aggregate<'a>(members: impl IntoIterator<Item = &'a FeaturesChecked>) -> Self {
        let members: Vec<_> = members.into_iter().collect();
        let non_empty = !members.is_empty();
        let errors: Vec<&str> = members
            .iter()
            .map(|f| f.error.as_deref().unwrap_or(""))
            .collect();
        Self {
            features: Features {
                valid: members.iter().all(|f| f.valid()),
                signing: non_empty && members.iter().all(|f| f.signing()),
                encryption: non_empty && members.iter().all(|f| f.encryption()),
            },
            error: errors
                .iter()
                .any(|e| !e.is_empty())
                .then(|| errors.join("\n")),
        }
    }

    /// Short human description, e.g. "for encryption and signing".
    pub fn explain(&self) -> String {
        if !self.valid() {
            return "invalid key".into();
        }
        let mut uses = Vec::new();
        if self.encryption() {
            uses.push("encryption");
        }
        if self.signing() {
            uses.push("signing");
        }
        if uses.is_empty() {
            "no feature available".into()
        } else {
            format!("for {}", uses.join(" and "))
        }
    }
}
