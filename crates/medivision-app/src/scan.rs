// Image search: upload a captured or picked photo and decide where the
// results go.

use std::path::Path;

use medivision_api::{ApiClient, ApiError, ImageUpload};
use medivision_core::alert::{Alert, AlertKind};
use medivision_core::model::MedicineResult;
use medivision_core::prefs::LanguageState;
use serde::Serialize;
use tracing::info;

/// Where an image-search outcome sends the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "route", content = "medicines", rename_all = "kebab-case")]
pub enum ScanRoute {
    /// Nothing recognized; stay on the scan screen.
    NotFound,
    /// Exactly one hit, opened directly.
    Detail(Box<MedicineResult>),
    /// Result list, in the order the server ranked it.
    Results(Vec<MedicineResult>),
}

impl ScanRoute {
    pub fn from_results(results: Vec<MedicineResult>, single_to_detail: bool) -> Self {
        match results.len() {
            0 => ScanRoute::NotFound,
            1 if single_to_detail => results
                .into_iter()
                .next()
                .map_or(ScanRoute::NotFound, |only| ScanRoute::Detail(Box::new(only))),
            _ => ScanRoute::Results(results),
        }
    }

    /// Medicines carried by this route.
    pub fn medicines(&self) -> &[MedicineResult] {
        match self {
            ScanRoute::NotFound => &[],
            ScanRoute::Detail(one) => std::slice::from_ref(&**one),
            ScanRoute::Results(all) => all,
        }
    }

    /// Informational alert for an empty result, if any.
    pub fn alert(&self, language: &LanguageState) -> Option<Alert> {
        match self {
            ScanRoute::NotFound => Some(Alert::new(
                AlertKind::Info,
                language.t("noMedicinesFound"),
                language.t("noMedicinesFoundDesc"),
            )),
            _ => None,
        }
    }
}

/// Read `path`, run the image search and route the outcome.
pub async fn scan_image(
    api: &ApiClient,
    path: &Path,
    single_to_detail: bool,
) -> Result<ScanRoute, ApiError> {
    let upload = ImageUpload::from_path(path).await?;
    info!(
        "Image search with {} ({}, {} bytes)",
        upload.file_name,
        upload.mime_type,
        upload.bytes.len()
    );
    let results = api.search_by_image(upload).await?;
    info!("Image search returned {} result(s)", results.len());
    Ok(ScanRoute::from_results(results, single_to_detail))
}
