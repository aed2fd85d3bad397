//! Tile coding with hashed grid coordinates.
//!
//! Each call quantizes the real-valued inputs onto `num_tilings` grids, each
//! grid displaced from the previous one by an asymmetric offset, and hashes the
//! coordinates of the active tile of every grid into a bounded index space.
//!
//! Hashing uses the UNH universal hash: a table of 2048 random words indexed by
//! coordinate, summed and reduced modulo the target size. Indices either wrap
//! directly onto `memory_size` ([`IndexSpace::Modulo`]), go through a
//! [`CollisionTable`] that tracks (and optionally resolves) hash collisions, or
//! are handed out sequentially by an [`IndexTable`].

use crate::error::TileError;
use rand::RngCore;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::HashMap;

/// Number of random words backing [`UnhHasher`].
pub const RANDOM_TABLE_SIZE: usize = 2048;

/// Index space used by the reference benchmark scenarios.
pub const DEFAULT_MEMORY_SIZE: usize = 16_384;

const INDEX_INCREMENT: i64 = 449;
const CHECK_INCREMENT: i64 = 457;
const CHECK_MODULUS: i64 = 2_147_483_647;

/// UNH hash over a fixed table of random words.
#[derive(Clone, Debug)]
pub struct UnhHasher {
    table: Box<[u32]>,
}

impl UnhHasher {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let table = (0..RANDOM_TABLE_SIZE).map(|_| rng.next_u32()).collect();
        Self { table }
    }

    /// Hash `coords` into `[0, modulus)`. `modulus` must be positive.
    pub fn hash(&self, coords: &[i64], modulus: i64, increment: i64) -> i64 {
        let size = RANDOM_TABLE_SIZE as i64;
        let sum: i64 = coords
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                // (c + increment * i) mod size, reduced term by term so extreme
                // coordinates cannot overflow.
                let offset = (increment * i as i64).rem_euclid(size);
                let slot = (c.rem_euclid(size) + offset) % size;
                i64::from(self.table[slot as usize])
            })
            .sum();
        sum.rem_euclid(modulus)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Safety {
    /// Count collisions but let colliding coordinates share a slot.
    Unsafe,
    /// Resolve collisions by double hashing into a free slot.
    Safe,
}

/// Open-addressing table mapping coordinate hashes onto distinct slots.
#[derive(Clone, Debug)]
pub struct CollisionTable {
    slots: Vec<Option<u32>>,
    safety: Safety,
    calls: u64,
    clear_hits: u64,
    collisions: u64,
}

impl CollisionTable {
    /// `size` must be a power of two so the odd probe stride visits every slot.
    pub fn new(size: usize, safety: Safety) -> Result<Self, TileError> {
        if !size.is_power_of_two() {
            return Err(TileError::TableSizeNotPowerOfTwo(size));
        }
        Ok(Self {
            slots: vec![None; size],
            safety,
            calls: 0,
            clear_hits: 0,
            collisions: 0,
        })
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn safety(&self) -> Safety {
        self.safety
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn clear_hits(&self) -> u64 {
        self.clear_hits
    }

    pub fn collisions(&self) -> u64 {
        self.collisions
    }

    /// Number of occupied slots.
    pub fn usage(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn reset(&mut self) {
        self.slots.fill(None);
        self.calls = 0;
        self.clear_hits = 0;
        self.collisions = 0;
    }

    fn index(&mut self, hasher: &UnhHasher, coords: &[i64]) -> Result<usize, TileError> {
        self.calls += 1;
        let size = self.slots.len();
        let mut j = hasher.hash(coords, size as i64, INDEX_INCREMENT) as usize;
        // Always below CHECK_MODULUS, so it fits in u32.
        let check = hasher.hash(coords, CHECK_MODULUS, CHECK_INCREMENT) as u32;

        match self.slots[j] {
            Some(existing) if existing == check => self.clear_hits += 1,
            None => {
                self.clear_hits += 1;
                self.slots[j] = Some(check);
            }
            Some(_) if self.safety == Safety::Unsafe => self.collisions += 1,
            Some(_) => {
                let stride =
                    1 + 2 * hasher.hash(coords, CHECK_MODULUS / 4, INDEX_INCREMENT) as usize;
                let mut probes = 0usize;
                loop {
                    self.collisions += 1;
                    probes += 1;
                    j = (j + stride) % size;
                    if probes > size {
                        return Err(TileError::CollisionTableFull { probes });
                    }
                    match self.slots[j] {
                        Some(existing) if existing == check => break,
                        None => {
                            self.slots[j] = Some(check);
                            break;
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        Ok(j)
    }
}

/// Hands out indices `0, 1, 2, ...` to tile coordinates in first-seen order.
///
/// Once `capacity` indices are in use the counter wraps to 0 and keeps going,
/// so later tiles share indices with earlier ones. The overflow is remembered
/// and reported by [`IndexTable::check`].
#[derive(Clone, Debug)]
pub struct IndexTable {
    indices: HashMap<(u32, u32), usize>,
    capacity: usize,
    next: usize,
    overflowed: bool,
}

impl IndexTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            indices: HashMap::new(),
            capacity,
            next: 0,
            overflowed: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of distinct tiles seen so far.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// `Err` once more distinct tiles were seen than there are indices.
    pub fn check(&self) -> Result<(), TileError> {
        if self.overflowed {
            return Err(TileError::IndexOverflow {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    fn index(&mut self, hasher: &UnhHasher, coords: &[i64]) -> usize {
        let key = (
            hasher.hash(coords, CHECK_MODULUS, INDEX_INCREMENT) as u32,
            hasher.hash(coords, CHECK_MODULUS, CHECK_INCREMENT) as u32,
        );
        if let Some(&idx) = self.indices.get(&key) {
            return idx;
        }
        if self.next >= self.capacity {
            self.overflowed = true;
            self.next = 0;
        }
        let idx = self.next;
        self.next += 1;
        self.indices.insert(key, idx);
        idx
    }
}

/// Where hashed tile coordinates land.
#[derive(Debug)]
pub enum IndexSpace<'a> {
    /// Reduce the hash modulo `memory_size`.
    Modulo(usize),
    /// Route the hash through a collision table.
    Collision(&'a mut CollisionTable),
    /// Number tiles sequentially as they are first seen.
    Indexed(&'a mut IndexTable),
}

impl IndexSpace<'_> {
    /// Shorter-lived view of the same space, for coding several groups in one call.
    pub fn reborrow(&mut self) -> IndexSpace<'_> {
        match self {
            IndexSpace::Modulo(memory_size) => IndexSpace::Modulo(*memory_size),
            IndexSpace::Collision(table) => IndexSpace::Collision(&mut **table),
            IndexSpace::Indexed(table) => IndexSpace::Indexed(&mut **table),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            IndexSpace::Modulo(memory_size) => *memory_size == 0,
            IndexSpace::Collision(_) => false,
            IndexSpace::Indexed(table) => table.capacity() == 0,
        }
    }
}

fn tiling_count(len: usize) -> Result<i64, TileError> {
    match i32::try_from(len) {
        Ok(0) => Err(TileError::NoTilings),
        Ok(n) => Ok(i64::from(n)),
        Err(_) => Err(TileError::TooManyTilings(len)),
    }
}

/// Tile coder with reusable scratch space.
///
/// The scratch vectors grow to fit the widest input seen and are then reused,
/// so steady-state calls with a fixed input width do not allocate.
#[derive(Clone, Debug)]
pub struct Tiler {
    hasher: UnhHasher,
    qstate: Vec<i64>,
    base: Vec<i64>,
    coords: Vec<i64>,
}

impl Tiler {
    pub fn new(hasher: UnhHasher) -> Self {
        Self {
            hasher,
            qstate: Vec::new(),
            base: Vec::new(),
            coords: Vec::new(),
        }
    }

    /// Fill `out` with one tile index per tiling; `out.len()` is the number of tilings.
    ///
    /// `ints` are extra integer coordinates hashed together with the quantized
    /// floats, e.g. to separate action or context groups. `None` hashes the
    /// floats and tiling number alone. Inputs must be finite; very large
    /// magnitudes clamp to the outermost `i32` grid cell.
    pub fn tiles(
        &mut self,
        out: &mut [usize],
        mut space: IndexSpace<'_>,
        floats: &[f32],
        ints: Option<&[i32]>,
    ) -> Result<(), TileError> {
        let num_tilings = tiling_count(out.len())?;
        if space.is_empty() {
            return Err(TileError::EmptyIndexSpace);
        }
        if let Some(index) = floats.iter().position(|f| !f.is_finite()) {
            return Err(TileError::NonFiniteInput { index });
        }

        let num_floats = floats.len();
        let scale = num_tilings as f32;

        self.qstate.clear();
        self.qstate
            .extend(floats.iter().map(|&f| i64::from((f * scale).floor() as i32)));
        self.base.clear();
        self.base.resize(num_floats, 0);
        self.coords.clear();
        self.coords.resize(num_floats + 1, 0);
        if let Some(ints) = ints {
            self.coords.extend(ints.iter().map(|&v| i64::from(v)));
        }

        for (tiling, slot) in out.iter_mut().enumerate() {
            for i in 0..num_floats {
                let q = self.qstate[i];
                // Lower corner of the active tile along dimension i.
                self.coords[i] = q - (q - self.base[i]).rem_euclid(num_tilings);
                self.base[i] += 1 + 2 * i as i64;
            }
            self.coords[num_floats] = tiling as i64;

            *slot = match &mut space {
                IndexSpace::Modulo(memory_size) => {
                    self.hasher.hash(&self.coords, *memory_size as i64, INDEX_INCREMENT) as usize
                }
                IndexSpace::Collision(table) => table.index(&self.hasher, &self.coords)?,
                IndexSpace::Indexed(table) => table.index(&self.hasher, &self.coords),
            };
        }
        Ok(())
    }
}
