// src/rpm/nevra.rs

//! NEVRA (name-epoch:version-release.arch) parsing
//!
//! A user-supplied package spec such as `foo-1.0-1.x86_64` is ambiguous: it
//! can be read as a full NEVRA, as a `name.arch`, or as a bare name that
//! happens to contain dashes. `Nevra::parse` returns every valid reading for
//! the requested forms, in form order.

use std::fmt;

/// The shapes a package spec can take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NevraForm {
    Nevra,
    Nevr,
    Nev,
    Na,
    Name,
}

impl NevraForm {
    /// Form order used when resolving user specs
    pub const DEFAULT_ORDER: [NevraForm; 5] = [
        NevraForm::Nevra,
        NevraForm::Na,
        NevraForm::Name,
        NevraForm::Nevr,
        NevraForm::Nev,
    ];
}

/// One interpretation of a package spec. Empty fields are unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nevra {
    pub name: String,
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl Nevra {
    /// Parse `spec` for each of `forms`, returning the valid interpretations
    pub fn parse(spec: &str, forms: &[NevraForm]) -> Vec<Nevra> {
        forms
            .iter()
            .filter_map(|form| Self::parse_form(spec, *form))
            .collect()
    }

    /// Parse `spec` as one specific form
    pub fn parse_form(spec: &str, form: NevraForm) -> Option<Nevra> {
        if spec.is_empty() || spec.contains(char::is_whitespace) {
            return None;
        }

        match form {
            NevraForm::Name => Some(Nevra {
                name: spec.to_string(),
                ..Default::default()
            }),
            NevraForm::Na => {
                let (name, arch) = split_last(spec, '.')?;
                Some(Nevra {
                    name: name.to_string(),
                    arch: arch.to_string(),
                    ..Default::default()
                })
            }
            NevraForm::Nev => {
                let (name, ev) = split_last(spec, '-')?;
                let (epoch, version) = split_epoch(ev)?;
                Some(Nevra {
                    name: name.to_string(),
                    epoch,
                    version: version.to_string(),
                    ..Default::default()
                })
            }
            NevraForm::Nevr => {
                let (nev, release) = split_last(spec, '-')?;
                let (name, ev) = split_last(nev, '-')?;
                let (epoch, version) = split_epoch(ev)?;
                Some(Nevra {
                    name: name.to_string(),
                    epoch,
                    version: version.to_string(),
                    release: release.to_string(),
                    ..Default::default()
                })
            }
            NevraForm::Nevra => {
                let (nevr, arch) = split_last(spec, '.')?;
                let mut nevra = Self::parse_form(nevr, NevraForm::Nevr)?;
                // The release may not swallow the arch separator of a name-version spec
                if arch.contains('-') {
                    return None;
                }
                nevra.arch = arch.to_string();
                Some(nevra)
            }
        }
    }

    pub fn has_just_name(&self) -> bool {
        self.epoch.is_empty()
            && self.version.is_empty()
            && self.release.is_empty()
            && self.arch.is_empty()
    }
}

impl fmt::Display for Nevra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.version.is_empty() {
            write!(f, "-")?;
            if !self.epoch.is_empty() && self.epoch != "0" {
                write!(f, "{}:", self.epoch)?;
            }
            write!(f, "{}", self.version)?;
        }
        if !self.release.is_empty() {
            write!(f, "-{}", self.release)?;
        }
        if !self.arch.is_empty() {
            write!(f, ".{}", self.arch)?;
        }
        Ok(())
    }
}

fn split_last(s: &str, sep: char) -> Option<(&str, &str)> {
    let (head, tail) = s.rsplit_once(sep)?;
    if head.is_empty() || tail.is_empty() {
        return None;
    }
    Some((head, tail))
}

fn split_epoch(ev: &str) -> Option<(String, &str)> {
    match ev.split_once(':') {
        Some((epoch, version)) => {
            if version.is_empty() || version.contains(':') {
                return None;
            }
            // Epoch must be numeric unless it is a glob
            if epoch.is_empty()
                || !(epoch.bytes().all(|b| b.is_ascii_digit()) || crate::sack::is_glob_pattern(epoch))
            {
                return None;
            }
            Some((epoch.to_string(), version))
        }
        None => Some((String::new(), ev)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_nevra() {
        let nevra = Nevra::parse_form("foo-bar-2:1.0-3.fc40.x86_64", NevraForm::Nevra).unwrap();
        assert_eq!(nevra.name, "foo-bar");
        assert_eq!(nevra.epoch, "2");
        assert_eq!(nevra.version, "1.0");
        assert_eq!(nevra.release, "3.fc40");
        assert_eq!(nevra.arch, "x86_64");
        assert_eq!(nevra.to_string(), "foo-bar-2:1.0-3.fc40.x86_64");
    }

    #[test]
    fn test_parse_name_arch() {
        let nevra = Nevra::parse_form("python3.noarch", NevraForm::Na).unwrap();
        assert_eq!(nevra.name, "python3");
        assert_eq!(nevra.arch, "noarch");
    }

    #[test]
    fn test_parse_nev_and_nevr() {
        let nev = Nevra::parse_form("foo-1.2", NevraForm::Nev).unwrap();
        assert_eq!(nev.name, "foo");
        assert_eq!(nev.version, "1.2");
        assert!(nev.epoch.is_empty());

        let nevr = Nevra::parse_form("foo-1.2-3", NevraForm::Nevr).unwrap();
        assert_eq!(nevr.name, "foo");
        assert_eq!(nevr.version, "1.2");
        assert_eq!(nevr.release, "3");
    }

    #[test]
    fn test_parse_rejects_invalid_forms() {
        assert!(Nevra::parse_form("foo", NevraForm::Na).is_none());
        assert!(Nevra::parse_form("foo", NevraForm::Nevr).is_none());
        assert!(Nevra::parse_form("-1.0", NevraForm::Nev).is_none());
        assert!(Nevra::parse_form("foo-x:1.0", NevraForm::Nev).is_none());
        assert!(Nevra::parse_form("", NevraForm::Name).is_none());
    }

    #[test]
    fn test_parse_all_forms() {
        let forms = Nevra::parse("foo-1.0-1.noarch", &NevraForm::DEFAULT_ORDER);
        // NEVRA, NA, NAME, NEVR, NEV are all syntactically possible
        assert_eq!(forms.len(), 5);
        assert_eq!(forms[0].arch, "noarch");
        assert_eq!(forms[1].name, "foo-1.0-1");
        assert_eq!(forms[2].name, "foo-1.0-1.noarch");
    }

    #[test]
    fn test_glob_epoch_is_allowed() {
        let nevra = Nevra::parse_form("foo-*:1.0-1", NevraForm::Nevr).unwrap();
        assert_eq!(nevra.epoch, "*");
    }
}
