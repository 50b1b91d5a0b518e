// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

pub mod posterior;

/// Key for matching candidates against VCF records. The alt allele is not part of the key,
/// so multiallelic records match on their position alone.
pub fn encode(contig: &str, position: u64) -> String {
    format!("{}:{}", contig, position)
}
