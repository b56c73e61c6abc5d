use std::fmt;

/// Extensions the store may ask the remote to ENABLE (RFC 5161).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    CondStore,
    QResync,
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CondStore => "CONDSTORE",
            Self::QResync => "QRESYNC",
        })
    }
}

/// What the remote advertised in its CAPABILITY response. Only the
/// capabilities the store cares about are tracked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub imap4rev1: bool,
    pub namespace: bool,
    pub enable: bool,
    pub condstore: bool,
    pub qresync: bool,
    pub quota: bool,
    pub special_use: bool,
    pub idle: bool,
}

impl Capabilities {
    pub fn parse<'a>(advertised: impl IntoIterator<Item = &'a str>) -> Self {
        let mut caps = Self::default();
        for cap in advertised {
            match cap.to_ascii_uppercase().as_str() {
                "IMAP4REV1" => caps.imap4rev1 = true,
                "NAMESPACE" => caps.namespace = true,
                "ENABLE" => caps.enable = true,
                "CONDSTORE" => caps.condstore = true,
                // QRESYNC implies CONDSTORE (RFC 7162 section 3.2.3)
                "QRESYNC" => {
                    caps.qresync = true;
                    caps.condstore = true;
                }
                "QUOTA" => caps.quota = true,
                "SPECIAL-USE" => caps.special_use = true,
                "IDLE" => caps.idle = true,
                other => tracing::trace!(capability = other, "ignoring capability"),
            }
        }
        caps
    }

    pub fn supports(&self, ext: Extension) -> bool {
        match ext {
            Extension::CondStore => self.condstore,
            Extension::QResync => self.qresync,
        }
    }

    pub fn to_vec(&self) -> Vec<&'static str> {
        let mut acc = vec![];
        if self.imap4rev1 {
            acc.push("IMAP4rev1");
        }
        if self.namespace {
            acc.push("NAMESPACE");
        }
        if self.enable {
            acc.push("ENABLE");
        }
        if self.condstore {
            acc.push("CONDSTORE");
        }
        if self.qresync {
            acc.push("QRESYNC");
        }
        if self.quota {
            acc.push("QUOTA");
        }
        if self.special_use {
            acc.push("SPECIAL-USE");
        }
        if self.idle {
            acc.push("IDLE");
        }
        acc
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_vec().join(" "))
    }
}
