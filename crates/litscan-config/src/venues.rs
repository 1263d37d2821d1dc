//! Default publisher buckets.
//!
//! Buckets are scanned in list order, so a journal listed under more than one
//! publisher resolves to the earliest bucket.

use serde::{Deserialize, Serialize};

/// One publisher and the journal titles that belong to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueBucket {
    pub publisher: String,
    pub journals: Vec<String>,
}

impl VenueBucket {
    pub fn new(publisher: impl Into<String>, journals: &[&str]) -> Self {
        Self {
            publisher: publisher.into(),
            journals: journals.iter().map(|j| j.to_string()).collect(),
        }
    }
}

const NATURE: &[&str] = &[
    "Nature",
    "Nature Medicine",
    "Nature Cancer",
    "Nature Communications",
    "Nature Genetics",
    "Nature Reviews Cancer",
    "Nature Reviews Clinical Oncology",
    "Nature Reviews Gastroenterology & Hepatology",
    "Nature Biotechnology",
    "Nature Cell Biology",
    "Nature Immunology",
    "Nature Reviews Disease Primers",
    "Nature Reviews Drug Discovery",
    "Nature Reviews Molecular Cell Biology",
    "Nature Reviews Immunology",
    "Nature Structural & Molecular Biology",
    "Nature Reviews Endocrinology",
    "Nature Reviews Urology",
    "Nature Reviews Neuroscience",
    "Nature Cardiovascular Research",
    "Nature Aging",
    "Nature Metabolism",
    "Nature Food",
    "Scientific Reports",
    "npj Precision Oncology",
    "npj Cancer Research",
    "Cell Death & Differentiation",
    "Oncogene",
    "British Journal of Cancer",
    "Gene Therapy",
    "Cancer Gene Therapy",
    "International Journal of Cancer",
    "European Journal of Cancer",
    "Cancer Letters",
    "Carcinogenesis",
    "Molecular Cancer",
    "Molecular Cancer Therapeutics",
    "Molecular Cancer Research",
    "Cancer Biology & Therapy",
    "Cancer Immunology Research",
    "Cancer Research",
    "Clinical Cancer Research",
    "Journal of Clinical Oncology",
    "JAMA Oncology",
    "Annals of Oncology",
    "Gut",
    "Journal of the National Cancer Institute",
];

const CELL: &[&str] = &[
    "Cell",
    "Cancer Cell",
    "Cell Stem Cell",
    "Cell Reports",
    "Cell Host & Microbe",
    "Cell Metabolism",
    "Cell Death & Disease",
    "Cell Research",
    "Cellular & Molecular Gastroenterology and Hepatology",
    "Cell Reports Medicine",
    "Cell Reports Methods",
    "Cell Systems",
    "Molecular Cell",
    "Developmental Cell",
    "Immunity",
    "Neuron",
    "Genes & Development",
    "Plant Cell",
    "Current Biology",
    "Journal of Cell Biology",
    "Journal of Cell Science",
    "Cell Calcium",
    "Cell Cycle",
    "Cellular and Molecular Life Sciences",
];

const SCIENCE: &[&str] = &[
    "Science",
    "Science Translational Medicine",
    "Science Advances",
    "Science Signaling",
    "Science Robotics",
    "Science Immunology",
    "Science China Life Sciences",
    "New England Journal of Medicine",
    "Lancet",
    "Lancet Oncology",
    "Lancet Gastroenterology & Hepatology",
    "JAMA",
];

/// The built-in Nature / Cell / Science tables.
pub fn default_venues() -> Vec<VenueBucket> {
    vec![
        VenueBucket::new("Nature", NATURE),
        VenueBucket::new("Cell", CELL),
        VenueBucket::new("Science", SCIENCE),
    ]
}
