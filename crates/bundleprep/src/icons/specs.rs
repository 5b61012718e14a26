//! The per-platform icon spec table.
//!
//! A fixed, versioned enumeration of every icon variant the platform
//! requires. This table is the contract the generator must satisfy and the
//! only source the manifest is built from; it is never derived by scanning
//! disk.

/// Bump when the required icon set changes shape.
pub const ICON_TABLE_VERSION: u32 = 1;

/// Device class an icon variant targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Idiom {
    Iphone,
    Ipad,
    /// The App Store listing artwork. Store validation treats this as the
    /// single most failure-prone artifact, so it never takes the
    /// skip-if-valid fast path.
    Marketing,
}

impl Idiom {
    /// Wire name used in the catalog manifest.
    pub fn as_str(&self) -> &'static str {
        match self {
            Idiom::Iphone => "iphone",
            Idiom::Ipad => "ipad",
            Idiom::Marketing => "ios-marketing",
        }
    }
}

/// One required icon variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IconSpec {
    /// Output filename inside the icon set directory. Unique per table.
    pub filename: &'static str,
    pub idiom: Idiom,
    /// Scale factor applied to the nominal size.
    pub scale: u32,
    /// Nominal logical size in points. Fractional for the 83.5pt iPad
    /// variant.
    pub size: f32,
}

impl IconSpec {
    /// Physical pixel edge of the (square) output.
    pub fn pixel_size(&self) -> u32 {
        (self.size * self.scale as f32).round() as u32
    }

    /// Manifest size label, e.g. `20x20` or `83.5x83.5`.
    pub fn size_label(&self) -> String {
        if self.size.fract() == 0.0 {
            format!("{0}x{0}", self.size as u32)
        } else {
            format!("{0}x{0}", self.size)
        }
    }

    /// Manifest scale label, e.g. `2x`.
    pub fn scale_label(&self) -> String {
        format!("{}x", self.scale)
    }

    pub fn is_marketing(&self) -> bool {
        self.idiom == Idiom::Marketing
    }
}

const fn spec(filename: &'static str, idiom: Idiom, scale: u32, size: f32) -> IconSpec {
    IconSpec {
        filename,
        idiom,
        scale,
        size,
    }
}

/// The iOS icon table: 15 variants covering iPhone, iPad, and the
/// marketing artwork.
pub const IOS_ICON_SPECS: [IconSpec; 15] = [
    spec("icon-20@2x.png", Idiom::Iphone, 2, 20.0),
    spec("icon-20@3x.png", Idiom::Iphone, 3, 20.0),
    spec("icon-29@2x.png", Idiom::Iphone, 2, 29.0),
    spec("icon-29@3x.png", Idiom::Iphone, 3, 29.0),
    spec("icon-40@2x.png", Idiom::Iphone, 2, 40.0),
    spec("icon-40@3x.png", Idiom::Iphone, 3, 40.0),
    spec("icon-60@2x.png", Idiom::Iphone, 2, 60.0),
    spec("icon-60@3x.png", Idiom::Iphone, 3, 60.0),
    spec("icon-20@2x-ipad.png", Idiom::Ipad, 2, 20.0),
    spec("icon-29@2x-ipad.png", Idiom::Ipad, 2, 29.0),
    spec("icon-40@2x-ipad.png", Idiom::Ipad, 2, 40.0),
    spec("icon-76.png", Idiom::Ipad, 1, 76.0),
    spec("icon-76@2x.png", Idiom::Ipad, 2, 76.0),
    spec("icon-83.5@2x.png", Idiom::Ipad, 2, 83.5),
    spec("icon-1024.png", Idiom::Marketing, 1, 1024.0),
];

/// Largest pixel edge any spec in the table requires.
pub fn max_pixel_size(specs: &[IconSpec]) -> u32 {
    specs.iter().map(|s| s.pixel_size()).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_has_fifteen_unique_filenames() {
        let names: HashSet<_> = IOS_ICON_SPECS.iter().map(|s| s.filename).collect();
        assert_eq!(names.len(), 15);
    }

    #[test]
    fn test_pixel_size_math() {
        let fractional = IOS_ICON_SPECS
            .iter()
            .find(|s| s.filename == "icon-83.5@2x.png")
            .unwrap();
        assert_eq!(fractional.pixel_size(), 167);

        let marketing = IOS_ICON_SPECS.iter().find(|s| s.is_marketing()).unwrap();
        assert_eq!(marketing.pixel_size(), 1024);

        let three_x = IOS_ICON_SPECS
            .iter()
            .find(|s| s.filename == "icon-60@3x.png")
            .unwrap();
        assert_eq!(three_x.pixel_size(), 180);
    }

    #[test]
    fn test_labels_match_wire_format() {
        let fractional = IOS_ICON_SPECS
            .iter()
            .find(|s| s.filename == "icon-83.5@2x.png")
            .unwrap();
        assert_eq!(fractional.size_label(), "83.5x83.5");
        assert_eq!(fractional.scale_label(), "2x");

        let whole = IOS_ICON_SPECS
            .iter()
            .find(|s| s.filename == "icon-20@2x.png")
            .unwrap();
        assert_eq!(whole.size_label(), "20x20");
    }

    #[test]
    fn test_exactly_one_marketing_spec() {
        let count = IOS_ICON_SPECS.iter().filter(|s| s.is_marketing()).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_max_pixel_size_is_marketing_edge() {
        assert_eq!(max_pixel_size(&IOS_ICON_SPECS), 1024);
    }
}
