//! Static tile layout of a playable area.
//!
//! The simulation core never parses map files; it consumes a tile lookup
//! capability and nothing more. Out-of-bounds coordinates are a valid,
//! non-solid region: they classify as [`Tile::Hollow`], never as an error.

/// Classification of a unit cell in the level's static layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tile {
    Solid,
    Hollow,
    Goal,
    Lethal,
    /// Level-defined classification, dispatched to tile behaviors like any
    /// other non-hollow kind.
    Custom(u8),
}

/// Tile lookup capability consumed by the scheduler and movement code.
pub trait TileSource {
    /// Width of the layout in cells.
    fn width(&self) -> u32;

    /// Height of the layout in cells.
    fn height(&self) -> u32;

    /// Tile at an in-bounds cell.
    fn tile_at(&self, x: u32, y: u32) -> Tile;

    /// Tile at any cell. Out-of-bounds classifies as hollow.
    fn classify(&self, x: i32, y: i32) -> Tile {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            Tile::Hollow
        } else {
            self.tile_at(x as u32, y as u32)
        }
    }

    fn is_solid(&self, x: i32, y: i32) -> bool {
        self.classify(x, y) == Tile::Solid
    }

    fn is_hollow(&self, x: i32, y: i32) -> bool {
        self.classify(x, y) == Tile::Hollow
    }
}

/// In-memory tile grid, row-major.
#[derive(Debug, Clone)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Create a grid filled with hollow cells.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: vec![Tile::Hollow; (width * height) as usize],
        }
    }

    /// Set a cell. Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, tile: Tile) {
        if x < self.width && y < self.height {
            self.tiles[(y * self.width + x) as usize] = tile;
        }
    }

    /// Fill a rectangular region with a tile kind.
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, tile: Tile) {
        for ty in y..(y + h).min(self.height) {
            for tx in x..(x + w).min(self.width) {
                self.set(tx, ty, tile);
            }
        }
    }

    /// Reset every cell to hollow.
    pub fn clear(&mut self) {
        self.tiles.fill(Tile::Hollow);
    }

    /// Count of cells with the given kind.
    pub fn count_of(&self, tile: Tile) -> usize {
        self.tiles.iter().filter(|t| **t == tile).count()
    }
}

impl TileSource for TileGrid {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn tile_at(&self, x: u32, y: u32) -> Tile {
        self.tiles[(y * self.width + x) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_grid_is_hollow() {
        let grid = TileGrid::new(8, 8);
        assert_eq!(grid.classify(3, 3), Tile::Hollow);
        assert_eq!(grid.count_of(Tile::Solid), 0);
    }

    #[test]
    fn out_of_bounds_is_hollow_not_error() {
        let grid = TileGrid::new(4, 4);
        assert_eq!(grid.classify(-1, 0), Tile::Hollow);
        assert_eq!(grid.classify(0, -10), Tile::Hollow);
        assert_eq!(grid.classify(4, 0), Tile::Hollow);
        assert_eq!(grid.classify(100, 100), Tile::Hollow);
    }

    #[test]
    fn fill_rect_sets_region() {
        let mut grid = TileGrid::new(10, 10);
        grid.fill_rect(2, 2, 3, 3, Tile::Solid);
        assert_eq!(grid.count_of(Tile::Solid), 9);
        assert!(grid.is_solid(2, 2));
        assert!(grid.is_solid(4, 4));
        assert!(!grid.is_solid(5, 5));
    }

    #[test]
    fn custom_kinds_are_distinct() {
        let mut grid = TileGrid::new(4, 4);
        grid.set(0, 0, Tile::Custom(1));
        grid.set(1, 0, Tile::Custom(2));
        assert_ne!(grid.classify(0, 0), grid.classify(1, 0));
    }
}
