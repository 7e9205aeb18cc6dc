/// Side length of one atlas tile in pixels. Every source texture is
/// resampled to this size when composited.
pub const TILE_SIZE: u32 = 512;

/// Fixed tile arrangement of one atlas page.
///
/// Offsets are in pixels from the bottom-left corner of the page; every
/// tile is `TILE_SIZE` square.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub tiles: &'static [(u32, u32)],
}

impl TileLayout {
    /// Number of materials this layout holds.
    pub fn capacity(&self) -> usize {
        self.tiles.len()
    }
}

/// Four 512px tiles packed into a 1024x1024 page: top-left, top-right,
/// bottom-left, bottom-right.
pub static LAYOUT_QUAD: TileLayout = TileLayout {
    name: "4x512_to_1024",
    width: 1024,
    height: 1024,
    tiles: &[
        (0, TILE_SIZE),
        (TILE_SIZE, TILE_SIZE),
        (0, 0),
        (TILE_SIZE, 0),
    ],
};

/// Two 512px tiles stacked into a 512x1024 page: top, bottom.
pub static LAYOUT_PAIR: TileLayout = TileLayout {
    name: "2x512_to_512x1024",
    width: 512,
    height: 1024,
    tiles: &[(0, TILE_SIZE), (0, 0)],
};
