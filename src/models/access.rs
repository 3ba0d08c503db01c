/// Library authorization as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessStatus {
    #[default]
    NotDetermined,
    Authorized,
    /// User granted access to a hand-picked subset of the library.
    Limited,
    Denied,
    Restricted,
}

impl AccessStatus {
    pub fn allows_queries(self) -> bool {
        !matches!(self, Self::Denied | Self::Restricted)
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "notdetermined" | "unknown" => Some(Self::NotDetermined),
            "authorized" | "full" => Some(Self::Authorized),
            "limited" => Some(Self::Limited),
            "denied" => Some(Self::Denied),
            "restricted" => Some(Self::Restricted),
            _ => None,
        }
    }
}
