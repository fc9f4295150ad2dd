//! Placement validation.
//!
//! Pure checks over a loaded room slice: no store access, no clock. The
//! construction-site check is an ordered ladder where the first failing
//! rule decides the rejection, so callers can rely on stable reasons.

use contracts::{ObjectKind, RejectionReason, ReservationInfo, RoomObject};

use crate::terrain::{is_swamp, is_wall, TerrainGrid};

/// Base cost of a road on plain terrain.
pub const ROAD_BASE_COST: i64 = 300;

/// Road cost multiplier on swamp tiles.
pub const ROAD_SWAMP_FACTOR: i64 = 5;

/// Road cost multiplier when tunnelling through wall terrain.
pub const ROAD_WALL_FACTOR: i64 = 150;

/// Per-kind allowance rows indexed by controller level; a missing row means
/// the kind is uncapped. Rows saturate: levels past the end reuse the last
/// entry.
#[derive(Debug, Clone, Default)]
pub struct QuotaTable {
    rows: std::collections::BTreeMap<ObjectKind, Vec<u32>>,
}

impl QuotaTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_row(mut self, kind: ObjectKind, limits: &[u32]) -> Self {
        self.rows.insert(kind, limits.to_vec());
        self
    }

    pub fn allowance(&self, kind: ObjectKind, level: u8) -> Option<u32> {
        let row = self.rows.get(&kind)?;
        let index = (level as usize).min(row.len().saturating_sub(1));
        row.get(index).copied()
    }

    /// Default allowances per controller level 0..=8.
    pub fn builtin() -> Self {
        Self::empty()
            .with_row(ObjectKind::Spawn, &[0, 1, 1, 1, 1, 1, 1, 2, 3])
            .with_row(ObjectKind::Extension, &[0, 0, 5, 10, 20, 30, 40, 50, 60])
            .with_row(ObjectKind::Tower, &[0, 0, 0, 1, 1, 2, 2, 3, 6])
            .with_row(ObjectKind::Storage, &[0, 0, 0, 0, 1, 1, 1, 1, 1])
            .with_row(ObjectKind::Link, &[0, 0, 0, 0, 0, 2, 3, 4, 6])
            .with_row(ObjectKind::Extractor, &[0, 0, 0, 0, 0, 0, 1, 1, 1])
            .with_row(ObjectKind::Lab, &[0, 0, 0, 0, 0, 0, 3, 6, 10])
            .with_row(ObjectKind::Terminal, &[0, 0, 0, 0, 0, 0, 1, 1, 1])
            .with_row(ObjectKind::Observer, &[0, 0, 0, 0, 0, 0, 0, 0, 1])
            .with_row(ObjectKind::Nuker, &[0, 0, 0, 0, 0, 0, 0, 0, 1])
            .with_row(ObjectKind::Factory, &[0, 0, 0, 0, 0, 0, 0, 1, 1])
            .with_row(ObjectKind::Container, &[5, 5, 5, 5, 5, 5, 5, 5, 5])
    }
}

/// Build cost of a kind on the given terrain mask; `None` means the kind is
/// not player-constructible at all.
pub fn construction_cost(kind: ObjectKind, mask: u8) -> Option<i64> {
    let cost = match kind {
        ObjectKind::Road => {
            if is_wall(mask) {
                ROAD_BASE_COST * ROAD_WALL_FACTOR
            } else if is_swamp(mask) {
                ROAD_BASE_COST * ROAD_SWAMP_FACTOR
            } else {
                ROAD_BASE_COST
            }
        }
        ObjectKind::Spawn => 15_000,
        ObjectKind::Extension => 3_000,
        ObjectKind::Container => 5_000,
        ObjectKind::Rampart => 1,
        ObjectKind::ConstructedWall => 1,
        ObjectKind::Tower => 5_000,
        ObjectKind::Storage => 30_000,
        ObjectKind::Link => 5_000,
        ObjectKind::Extractor => 5_000,
        ObjectKind::Lab => 50_000,
        ObjectKind::Terminal => 100_000,
        ObjectKind::Observer => 8_000,
        ObjectKind::Nuker => 100_000,
        ObjectKind::Factory => 100_000,
        _ => return None,
    };
    Some(cost)
}

/// Kinds that keep other construction off their tile. Roads, containers,
/// ramparts and ruins coexist with new sites.
fn blocks_construction(kind: ObjectKind) -> bool {
    !matches!(
        kind,
        ObjectKind::Road
            | ObjectKind::Container
            | ObjectKind::Rampart
            | ObjectKind::Ruin
            | ObjectKind::Creep
            | ObjectKind::ConstructionSite
    )
}

fn exempt_from_exit_rules(kind: ObjectKind) -> bool {
    matches!(kind, ObjectKind::Road | ObjectKind::Container)
}

/// Everything the construction-site ladder reads.
pub struct PlacementInputs<'a> {
    /// Decoded terrain, or `None` when the room is unknown to the store.
    pub terrain: Option<&'a TerrainGrid>,
    /// All objects in the room, same shard view as the request.
    pub objects: &'a [RoomObject],
    /// The user's construction sites across every room and shard.
    pub user_site_count: u32,
    pub quota: &'a QuotaTable,
    /// Global per-user site cap.
    pub max_sites: u32,
}

/// Validated single-tile placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePlacement {
    pub kind: ObjectKind,
    pub x: i64,
    pub y: i64,
    pub cost: i64,
}

fn objects_at(objects: &[RoomObject], x: i64, y: i64) -> impl Iterator<Item = &RoomObject> {
    objects.iter().filter(move |o| o.x == x && o.y == y)
}

fn is_exit_tile(grid: &TerrainGrid, x: i64, y: i64) -> bool {
    let on_border = x == 0 || x == 49 || y == 0 || y == 49;
    on_border && !is_wall(grid.mask_or_wall(x, y))
}

fn exit_within(grid: &TerrainGrid, x: i64, y: i64, range: i64) -> bool {
    for dy in -range..=range {
        for dx in -range..=range {
            if is_exit_tile(grid, x + dx, y + dy) {
                return true;
            }
        }
    }
    false
}

/// Border tiles adjacent to an inner-ring candidate. Placement there is
/// allowed only when all of them are wall, which is what lets players seal
/// a room entrance flush against the edge.
fn adjacent_border_sealed(grid: &TerrainGrid, x: i64, y: i64) -> bool {
    let mut sealed = true;
    let mut check_edge = |edge_fixed: (Option<i64>, Option<i64>)| {
        for delta in -1..=1 {
            let (bx, by) = match edge_fixed {
                (Some(bx), None) => (bx, y + delta),
                (None, Some(by)) => (x + delta, by),
                _ => continue,
            };
            if (0..=49).contains(&bx)
                && (0..=49).contains(&by)
                && !is_wall(grid.mask_or_wall(bx, by))
            {
                sealed = false;
            }
        }
    };
    if x == 1 {
        check_edge((Some(0), None));
    }
    if x == 48 {
        check_edge((Some(49), None));
    }
    if y == 1 {
        check_edge((None, Some(0)));
    }
    if y == 48 {
        check_edge((None, Some(49)));
    }
    sealed
}

fn reservation_user(reservation: &Option<ReservationInfo>) -> Option<&str> {
    reservation.as_ref().map(|r| r.user.as_str())
}

/// The construction-site ladder. Checks run in a fixed order and the first
/// failure wins.
pub fn check_site(
    user: &str,
    kind: ObjectKind,
    x: i64,
    y: i64,
    inputs: &PlacementInputs<'_>,
) -> Result<TilePlacement, RejectionReason> {
    // Non-constructible kinds fail before any world data is consulted.
    if construction_cost(kind, 0).is_none() {
        return Err(RejectionReason::InvalidArgs);
    }
    if !(0..=49).contains(&x) || !(0..=49).contains(&y) {
        return Err(RejectionReason::OutOfBounds);
    }
    let Some(grid) = inputs.terrain else {
        return Err(RejectionReason::UnknownRoom);
    };
    let mask = grid.mask_or_wall(x, y);

    if kind == ObjectKind::Extractor
        && !objects_at(inputs.objects, x, y).any(|o| o.kind == ObjectKind::Mineral)
    {
        return Err(RejectionReason::MissingMineral);
    }

    let same_kind_present = objects_at(inputs.objects, x, y).any(|o| {
        o.kind == kind
            || (o.kind == ObjectKind::ConstructionSite && o.structure_kind == Some(kind))
    });
    if same_kind_present {
        return Err(RejectionReason::TileOccupied);
    }

    // Ramparts stack on top of anything; everything else needs a clear tile.
    if kind != ObjectKind::Rampart {
        let blocked = objects_at(inputs.objects, x, y).any(|o| {
            if kind == ObjectKind::Extractor && o.kind == ObjectKind::Mineral {
                return false;
            }
            o.kind == ObjectKind::ConstructionSite || blocks_construction(o.kind)
        });
        if blocked {
            return Err(RejectionReason::TileOccupied);
        }
    }

    // Roads tunnel through walls; extractors sit on the mineral's wall tile.
    if is_wall(mask) && kind != ObjectKind::Road && kind != ObjectKind::Extractor {
        return Err(RejectionReason::UnwalkableTerrain);
    }

    // The border strip itself is exit ground for every kind.
    if x == 0 || x == 49 || y == 0 || y == 49 {
        return Err(RejectionReason::TooNearExit);
    }

    if !exempt_from_exit_rules(kind) {
        if (x == 1 || x == 48 || y == 1 || y == 48) && !adjacent_border_sealed(grid, x, y) {
            return Err(RejectionReason::BorderNotSealed);
        }
        if exit_within(grid, x, y, 2) {
            return Err(RejectionReason::TooNearExit);
        }
    }

    let controller = inputs
        .objects
        .iter()
        .find(|o| o.kind == ObjectKind::Controller);
    match controller {
        Some(ctrl) => {
            let owned_by_user = ctrl.user.as_deref() == Some(user);
            let reserved_by_user = reservation_user(&ctrl.reservation) == Some(user);
            if !owned_by_user && !reserved_by_user {
                return Err(RejectionReason::NotOwned);
            }
        }
        None => {
            // Controller-less rooms accept neutral infrastructure, never spawns.
            if kind == ObjectKind::Spawn {
                return Err(RejectionReason::NotOwned);
            }
        }
    }

    let level = controller.and_then(|c| c.level).unwrap_or(0);
    if let Some(limit) = inputs.quota.allowance(kind, level) {
        let in_room = inputs
            .objects
            .iter()
            .filter(|o| {
                o.kind == kind
                    || (o.kind == ObjectKind::ConstructionSite && o.structure_kind == Some(kind))
            })
            .count() as u32;
        if in_room + 1 > limit {
            return Err(RejectionReason::QuotaExceeded);
        }
    }

    if inputs.user_site_count >= inputs.max_sites {
        return Err(RejectionReason::SiteCapReached);
    }

    let cost = match construction_cost(kind, mask) {
        Some(cost) => cost,
        None => return Err(RejectionReason::InvalidArgs),
    };
    Ok(TilePlacement { kind, x, y, cost })
}

/// Spawn (re)placement. Looser than the site ladder: the room may be
/// unclaimed, but a controller must exist and not belong to someone else.
pub fn check_spawn_site(
    user: &str,
    x: i64,
    y: i64,
    terrain: Option<&TerrainGrid>,
    objects: &[RoomObject],
) -> Result<(), RejectionReason> {
    if !(0..=49).contains(&x) || !(0..=49).contains(&y) {
        return Err(RejectionReason::OutOfBounds);
    }
    let Some(grid) = terrain else {
        return Err(RejectionReason::UnknownRoom);
    };
    if is_wall(grid.mask_or_wall(x, y)) {
        return Err(RejectionReason::UnwalkableTerrain);
    }
    if x == 0 || x == 49 || y == 0 || y == 49 || exit_within(grid, x, y, 2) {
        return Err(RejectionReason::TooNearExit);
    }
    if objects_at(objects, x, y).next().is_some() {
        return Err(RejectionReason::TileOccupied);
    }
    let Some(controller) = objects.iter().find(|o| o.kind == ObjectKind::Controller) else {
        return Err(RejectionReason::NotOwned);
    };
    if let Some(owner) = controller.user.as_deref() {
        if owner != user {
            return Err(RejectionReason::NotOwned);
        }
    }
    if let Some(holder) = reservation_user(&controller.reservation) {
        if holder != user {
            return Err(RejectionReason::NotOwned);
        }
    }
    Ok(())
}

/// SplitMix64 step. Drives every bounded random search so results are
/// reproducible from a caller seed.
pub fn mix_seed(value: u64) -> u64 {
    let mut mixed = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    mixed = (mixed ^ (mixed >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    mixed = (mixed ^ (mixed >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    mixed ^ (mixed >> 31)
}

/// True when every blueprint tile lands on a clear, non-wall, non-border
/// tile.
pub fn blueprint_fits(
    blueprint: &contracts::Blueprint,
    origin_x: i64,
    origin_y: i64,
    grid: &TerrainGrid,
    objects: &[RoomObject],
) -> bool {
    blueprint.tiles.iter().all(|tile| {
        let x = origin_x + tile.dx;
        let y = origin_y + tile.dy;
        if !(1..=48).contains(&x) || !(1..=48).contains(&y) {
            return false;
        }
        if is_wall(grid.mask_or_wall(x, y)) {
            return false;
        }
        objects_at(objects, x, y).next().is_none()
    })
}

/// Bounded random search for a blueprint origin over the room interior.
/// The attempt sequence is fully determined by `seed`.
pub fn find_origin(
    blueprint: &contracts::Blueprint,
    grid: &TerrainGrid,
    objects: &[RoomObject],
    seed: u64,
    attempts: u32,
) -> Option<(i64, i64)> {
    let mut state = seed;
    for _ in 0..attempts {
        state = mix_seed(state);
        let x = 4 + (state % 42) as i64;
        state = mix_seed(state);
        let y = 4 + (state % 42) as i64;
        if blueprint_fits(blueprint, x, y, grid, objects) {
            return Some((x, y));
        }
    }
    None
}
