use log::{debug, warn};

use crate::ai::AIProvider;
use crate::error::ApplyError;
use crate::models::{Locale, OfferRecord};

const COVER_LETTER_MAX_TOKENS: u32 = 300;

/// Resume links, one per supported locale.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeUrls {
    pub fr: String,
    pub es: String,
}

impl ResumeUrls {
    pub fn for_locale(&self, locale: Locale) -> &str {
        match locale {
            Locale::Fr => &self.fr,
            Locale::Es => &self.es,
        }
    }
}

pub struct Enricher<'a> {
    provider: Option<&'a dyn AIProvider>,
    resumes: &'a ResumeUrls,
    applicant_name: Option<&'a str>,
}

impl<'a> Enricher<'a> {
    pub fn new(
        provider: Option<&'a dyn AIProvider>,
        resumes: &'a ResumeUrls,
        applicant_name: Option<&'a str>,
    ) -> Self {
        Self { provider, resumes, applicant_name }
    }

    /// Attaches a cover letter and the locale's resume URL. Never fails: a
    /// provider error falls back to the templated letter.
    pub fn enrich(&self, mut offer: OfferRecord, locale: Locale) -> OfferRecord {
        offer.cover_letter = Some(self.cover_letter(&offer, locale));
        offer.resume_url = Some(self.resumes.for_locale(locale).to_string());
        offer
    }

    fn cover_letter(&self, offer: &OfferRecord, locale: Locale) -> String {
        let Some(provider) = self.provider else {
            return fallback_letter(offer, locale, self.applicant_name);
        };

        match generate_letter(provider, offer, locale) {
            Ok(letter) => {
                debug!("Cover letter for '{}' generated by {}", offer.title, provider.model_name());
                letter
            }
            Err(e) => {
                warn!("{} (offer '{}'), using template", e, offer.title);
                fallback_letter(offer, locale, self.applicant_name)
            }
        }
    }
}

fn generate_letter(
    provider: &dyn AIProvider,
    offer: &OfferRecord,
    locale: Locale,
) -> Result<String, ApplyError> {
    let prompt = cover_letter_prompt(offer, locale);
    let text = provider
        .complete(&prompt, COVER_LETTER_MAX_TOKENS)
        .map_err(|e| ApplyError::Enrichment(format!("{:#}", e)))?;
    let text = text.trim();
    if text.is_empty() {
        return Err(ApplyError::Enrichment("empty response".to_string()));
    }
    Ok(text.to_string())
}

pub fn cover_letter_prompt(offer: &OfferRecord, locale: Locale) -> String {
    let language = match locale {
        Locale::Fr => "français",
        Locale::Es => "espagnol",
    };
    let company = offer.company.as_deref().unwrap_or("l'entreprise");
    format!(
        "Rédige une lettre de motivation professionnelle en {language} \
         pour postuler au poste '{}' chez '{company}'. \
         Courte, impactante, 6 à 8 phrases, ton chaleureux et convaincant, \
         adaptée pour une candidature en ligne.",
        offer.title
    )
}

/// Deterministic letter used when no provider is configured or it fails.
pub fn fallback_letter(offer: &OfferRecord, locale: Locale, applicant_name: Option<&str>) -> String {
    let mut letter = match locale {
        Locale::Fr => format!(
            "Bonjour,\n\nJe souhaite postuler pour le poste {} chez {}.\n\
             Mon profil et mon CV ci-joint correspondent aux missions décrites, \
             et je serais ravi d'en échanger avec vous.\n\nCordialement,",
            offer.title,
            offer.company.as_deref().unwrap_or("votre entreprise"),
        ),
        Locale::Es => format!(
            "Hola,\n\nMe gustaría postularme al puesto de {} en {}.\n\
             Mi perfil y el CV adjunto se ajustan a las funciones descritas, \
             y estaré encantado de conversar con ustedes.\n\nAtentamente,",
            offer.title,
            offer.company.as_deref().unwrap_or("su empresa"),
        ),
    };
    if let Some(name) = applicant_name {
        letter.push('\n');
        letter.push_str(name);
    }
    letter
}
