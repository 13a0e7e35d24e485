use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;

use crate::input::InputError;
use crate::model::FitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyKind {
    Gaussian,
    Poisson,
    Gamma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    Identity,
    Log,
    Inverse,
    Sqrt,
}

/// Error distribution plus link function of a smooth regression model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub kind: FamilyKind,
    pub link: Link,
}

impl Family {
    pub fn gaussian() -> Self {
        Self {
            kind: FamilyKind::Gaussian,
            link: Link::Identity,
        }
    }

    pub fn new(kind: FamilyKind, link: Link) -> Result<Self, InputError> {
        let allowed: &[Link] = match kind {
            FamilyKind::Gaussian => &[Link::Identity, Link::Log, Link::Inverse],
            FamilyKind::Poisson => &[Link::Log, Link::Identity, Link::Sqrt],
            FamilyKind::Gamma => &[Link::Inverse, Link::Identity, Link::Log],
        };
        if !allowed.contains(&link) {
            return Err(InputError::InvalidInput(format!(
                "link '{}' is not available for family '{}'",
                link.name(),
                kind.name()
            )));
        }
        Ok(Self { kind, link })
    }

    /// Parses a family name and optional link name; the canonical link is
    /// used when `link` is `None`.
    pub fn parse(family: &str, link: Option<&str>) -> Result<Self, InputError> {
        let kind = match family.trim().to_ascii_lowercase().as_str() {
            "gaussian" | "normal" => FamilyKind::Gaussian,
            "poisson" => FamilyKind::Poisson,
            "gamma" => FamilyKind::Gamma,
            other => {
                return Err(InputError::InvalidInput(format!(
                    "unrecognized family '{other}' (use gaussian|poisson|gamma)"
                )));
            }
        };
        let link = match link {
            None => kind.canonical_link(),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "identity" => Link::Identity,
                "log" => Link::Log,
                "inverse" => Link::Inverse,
                "sqrt" => Link::Sqrt,
                other => {
                    return Err(InputError::InvalidInput(format!(
                        "unrecognized link '{other}' (use identity|log|inverse|sqrt)"
                    )));
                }
            },
        };
        Self::new(kind, link)
    }

    pub fn known_scale(&self) -> bool {
        self.kind == FamilyKind::Poisson
    }

    pub fn link(&self, mu: f64) -> f64 {
        match self.link {
            Link::Identity => mu,
            Link::Log => mu.ln(),
            Link::Inverse => 1.0 / mu,
            Link::Sqrt => mu.sqrt(),
        }
    }

    pub fn linkinv(&self, eta: f64) -> f64 {
        match self.link {
            Link::Identity => eta,
            Link::Log => eta.exp(),
            Link::Inverse => 1.0 / eta,
            Link::Sqrt => eta * eta,
        }
    }

    /// d mu / d eta
    pub fn mu_eta(&self, eta: f64) -> f64 {
        match self.link {
            Link::Identity => 1.0,
            Link::Log => eta.exp(),
            Link::Inverse => -1.0 / (eta * eta),
            Link::Sqrt => 2.0 * eta,
        }
    }

    pub fn variance(&self, mu: f64) -> f64 {
        match self.kind {
            FamilyKind::Gaussian => 1.0,
            FamilyKind::Poisson => mu,
            FamilyKind::Gamma => mu * mu,
        }
    }

    pub fn valid_mu(&self, mu: f64) -> bool {
        match self.kind {
            FamilyKind::Gaussian => mu.is_finite(),
            FamilyKind::Poisson | FamilyKind::Gamma => mu.is_finite() && mu > 0.0,
        }
    }

    pub fn valid_eta(&self, eta: f64) -> bool {
        if !eta.is_finite() {
            return false;
        }
        match self.link {
            Link::Inverse => eta != 0.0,
            Link::Sqrt => eta > 0.0,
            Link::Identity | Link::Log => true,
        }
    }

    pub fn check_response(&self, y: &[f64]) -> Result<(), FitError> {
        match self.kind {
            FamilyKind::Gaussian => Ok(()),
            FamilyKind::Poisson => {
                if y.iter().any(|v| *v < 0.0) {
                    return Err(FitError::Domain(
                        "negative values are not allowed for the poisson family".to_string(),
                    ));
                }
                if y.iter().all(|v| *v == 0.0) {
                    return Err(FitError::Domain(
                        "response is identically zero".to_string(),
                    ));
                }
                Ok(())
            }
            FamilyKind::Gamma => {
                if y.iter().any(|v| *v <= 0.0) {
                    return Err(FitError::Domain(
                        "non-positive values are not allowed for the gamma family".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn init_mu(&self, y: f64) -> f64 {
        match self.kind {
            FamilyKind::Gaussian => match self.link {
                Link::Log | Link::Inverse if y <= 0.0 => 0.1,
                _ => y,
            },
            FamilyKind::Poisson => y + 0.1,
            FamilyKind::Gamma => y,
        }
    }

    pub fn dev_resid(&self, y: f64, mu: f64) -> f64 {
        match self.kind {
            FamilyKind::Gaussian => (y - mu).powi(2),
            FamilyKind::Poisson => {
                let ylogy = if y > 0.0 { y * (y / mu).ln() } else { 0.0 };
                2.0 * (ylogy - (y - mu))
            }
            FamilyKind::Gamma => 2.0 * (-(y / mu).ln() + (y - mu) / mu),
        }
    }

    pub fn deviance(&self, y: &[f64], mu: &[f64]) -> f64 {
        y.iter()
            .zip(mu.iter())
            .map(|(y, m)| self.dev_resid(*y, *m))
            .sum()
    }

    /// Minus twice the log-likelihood at the fitted means.
    pub fn neg2_loglik(&self, y: &[f64], mu: &[f64], scale: f64) -> f64 {
        let n = y.len() as f64;
        match self.kind {
            FamilyKind::Gaussian => {
                let rss = self.deviance(y, mu);
                n * ((2.0 * std::f64::consts::PI * rss / n).ln() + 1.0)
            }
            FamilyKind::Poisson => {
                -2.0 * y
                    .iter()
                    .zip(mu.iter())
                    .map(|(y, m)| y * m.ln() - m - ln_gamma(y + 1.0))
                    .sum::<f64>()
            }
            FamilyKind::Gamma => {
                let shape = 1.0 / scale;
                -2.0 * y
                    .iter()
                    .zip(mu.iter())
                    .map(|(y, m)| {
                        shape * (shape / m).ln() + (shape - 1.0) * y.ln()
                            - shape * y / m
                            - ln_gamma(shape)
                    })
                    .sum::<f64>()
            }
        }
    }

    pub fn label(&self) -> String {
        format!("{}({})", self.kind.name(), self.link.name())
    }
}

impl FamilyKind {
    pub fn canonical_link(self) -> Link {
        match self {
            FamilyKind::Gaussian => Link::Identity,
            FamilyKind::Poisson => Link::Log,
            FamilyKind::Gamma => Link::Inverse,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FamilyKind::Gaussian => "gaussian",
            FamilyKind::Poisson => "poisson",
            FamilyKind::Gamma => "gamma",
        }
    }
}

impl Link {
    pub fn name(self) -> &'static str {
        match self {
            Link::Identity => "identity",
            Link::Log => "log",
            Link::Inverse => "inverse",
            Link::Sqrt => "sqrt",
        }
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/family.rs"]
mod tests;
