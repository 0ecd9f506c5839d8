use std::borrow::Cow;
use std::fmt;

/// The four notification points around save and delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
}

impl HookPoint {
    pub const ALL: [Self; 4] = [Self::BeforeSave, Self::AfterSave, Self::BeforeDelete, Self::AfterDelete];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeSave => "beforeSave",
            Self::AfterSave => "afterSave",
            Self::BeforeDelete => "beforeDelete",
            Self::AfterDelete => "afterDelete",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload delivered to observers: the storage key and the backend it lives on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub point: HookPoint,
    pub path: String,
    pub backend: Cow<'static, str>,
}

impl StorageEvent {
    #[must_use]
    pub fn new(point: HookPoint, path: impl Into<String>, backend: impl Into<Cow<'static, str>>) -> Self {
        Self { point, path: path.into(), backend: backend.into() }
    }
}
