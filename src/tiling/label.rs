//! Sample-type labels from TCGA barcodes.
//!
//! A TCGA slide id looks like `TCGA-A7-A0CE-01A-01-TSA`. The fourth field
//! starts with the two-digit sample type: 01-09 are tumor samples, 10-19
//! normal samples and 20-99 controls.

use serde::Serialize;

const TCGA_PROJECT: &str = "TCGA";

/// Sample codes below this are tumor samples.
const FIRST_NORMAL_SAMPLE_CODE: u8 = 10;

/// Binary class of a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideLabel {
    Normal,
    Tumor,
}

impl SlideLabel {
    /// Training class: 1 for tumor, 0 otherwise.
    pub fn class_index(self) -> u8 {
        match self {
            SlideLabel::Normal => 0,
            SlideLabel::Tumor => 1,
        }
    }
}

/// Label a slide from its TCGA barcode, `None` for ids that are not TCGA
/// barcodes or carry no two-digit sample code.
pub fn slide_label(slide_id: &str) -> Option<SlideLabel> {
    let mut fields = slide_id.split('-');
    if !fields.next()?.eq_ignore_ascii_case(TCGA_PROJECT) {
        return None;
    }

    let sample = fields.nth(2)?.as_bytes();
    let code = match sample {
        [tens @ b'0'..=b'9', units @ b'0'..=b'9', ..] => (tens - b'0') * 10 + (units - b'0'),
        _ => return None,
    };

    Some(if code < FIRST_NORMAL_SAMPLE_CODE {
        SlideLabel::Tumor
    } else {
        SlideLabel::Normal
    })
}
