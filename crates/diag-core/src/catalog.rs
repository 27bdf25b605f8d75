//! Catálogo de conjuntos de requisitos de los dos flujos del dashboard: el
//! diagnóstico CT (una serie DICOM) y el análisis ómico multi-archivo.
//!
//! Ambos flujos usan el mismo controlador; sólo difieren en este conjunto.
use crate::model::ArtifactRequirementSet;

pub const CT_DIAGNOSIS: &str = "ct-diagnosis";
pub const OMICS_MULTI: &str = "omics-multi";

const CT_TABLE: &[(&str, &str)] = &[("DICOM-series", "CT DICOM series")];

const OMICS_TABLE: &[(&str, &str)] = &[("RNA-seq", "Transcriptomics (RNA-seq counts)"),
                                       ("proteomics", "Proteomics matrix"),
                                       ("metabolomics", "Metabolomics matrix"),
                                       ("clinical-variables", "Clinical variables table")];

pub fn ct_diagnosis() -> ArtifactRequirementSet {
    ArtifactRequirementSet::from_table(CT_DIAGNOSIS, CT_TABLE)
}

pub fn omics_analysis() -> ArtifactRequirementSet {
    ArtifactRequirementSet::from_table(OMICS_MULTI, OMICS_TABLE)
}

/// Busca un conjunto por id.
pub fn by_id(id: &str) -> Option<ArtifactRequirementSet> {
    match id {
        CT_DIAGNOSIS => Some(ct_diagnosis()),
        OMICS_MULTI => Some(omics_analysis()),
        _ => None,
    }
}
