use super::*;

const CORE_HITS: i64 = 100_000;

const MAX_STRONGHOLD_LEVEL: u8 = 5;

/// Rampart strength of a stronghold shell, by core level.
fn rampart_hits(level: u8) -> i64 {
    match level {
        0 | 1 => 100_000,
        2 => 200_000,
        3 => 500_000,
        4 => 1_000_000,
        _ => 2_000_000,
    }
}

/// Deployment layouts shipped with the engine. The core always sits at the
/// blueprint origin; rampart tiles carry no hits of their own and are filled
/// in per level at deploy time.
pub fn builtin_blueprints() -> Vec<Blueprint> {
    let outpost = Blueprint::named("outpost")
        .tile(0, 0, ObjectKind::InvaderCore, None)
        .tile(0, 0, ObjectKind::Rampart, None)
        .tile(-1, 0, ObjectKind::Rampart, None)
        .tile(1, 0, ObjectKind::Rampart, None)
        .tile(0, -1, ObjectKind::Rampart, None)
        .tile(0, 1, ObjectKind::Rampart, None);

    let mut bastion = Blueprint::named("bastion").tile(0, 0, ObjectKind::InvaderCore, None);
    for dy in -1..=1_i64 {
        for dx in -1..=1_i64 {
            bastion = bastion.tile(dx, dy, ObjectKind::Rampart, None);
        }
    }
    bastion = bastion
        .tile(-2, 0, ObjectKind::Container, Some(250_000))
        .tile(2, 0, ObjectKind::Container, Some(250_000));

    vec![outpost, bastion]
}

impl RulesEngine {
    /// Deploy a hostile stronghold into a room.
    ///
    /// The origin is either given explicitly or searched deterministically
    /// from the engine seed, the clock, and the room name, bounded by the
    /// configured attempt budget. The core and its shell land in a single
    /// mutation; the core stays dormant until `deploy_time`.
    pub fn deploy_stronghold(
        &mut self,
        request: &StrongholdRequest,
    ) -> Result<Decision<Vec<RoomObject>>, EngineError> {
        if request.level == 0 || request.level > MAX_STRONGHOLD_LEVEL {
            return Ok(Decision::rejected(RejectionReason::InvalidArgs));
        }
        let Some(blueprint) = builtin_blueprints()
            .into_iter()
            .find(|blueprint| blueprint.name == request.blueprint)
        else {
            return Ok(Decision::rejected(RejectionReason::InvalidArgs));
        };

        let slice = self.room_slice(&request.room, request.shard.as_deref())?;
        let Some(grid) = slice.terrain.as_ref() else {
            return Ok(Decision::rejected(RejectionReason::UnknownRoom));
        };
        let now = self.store.game_time()?;

        let origin = match request.origin {
            Some((x, y)) => {
                if !blueprint_fits(&blueprint, x, y, grid, &slice.objects) {
                    return Ok(Decision::rejected(RejectionReason::NoStrongholdFit));
                }
                (x, y)
            }
            None => {
                let seed = self.config.seed
                    ^ mix_seed(now)
                    ^ stable_text_hash(&request.room);
                match find_origin(
                    &blueprint,
                    grid,
                    &slice.objects,
                    seed,
                    self.config.stronghold_placement_attempts,
                ) {
                    Some(origin) => origin,
                    None => return Ok(Decision::rejected(RejectionReason::NoStrongholdFit)),
                }
            }
        };

        let mut inserts = Vec::with_capacity(blueprint.tiles.len());
        for tile in &blueprint.tiles {
            let prefix = match tile.kind {
                ObjectKind::InvaderCore => "core",
                ObjectKind::Rampart => "rampart",
                _ => "object",
            };
            let id = self.allocate_id(prefix)?;
            let mut object = RoomObject::new(
                id,
                tile.kind,
                request.shard.clone(),
                &request.room,
                origin.0 + tile.dx,
                origin.1 + tile.dy,
            );
            object.user = Some(HOSTILE_USER_ID.to_string());
            let hits = tile.hits.unwrap_or(match tile.kind {
                ObjectKind::InvaderCore => CORE_HITS,
                ObjectKind::Rampart => rampart_hits(request.level),
                _ => 1,
            });
            object.hits = Some(hits);
            object.hits_max = Some(hits);
            if tile.kind == ObjectKind::InvaderCore {
                object.level = Some(request.level);
                object.deploy_time = Some(now + self.config.stronghold_deploy_delay);
            }
            inserts.push(object);
        }

        self.store.apply(WorldMutation {
            inserts: inserts.clone(),
            ..WorldMutation::default()
        })?;
        log::info!(
            "stronghold {} (level {}) deployed in {} at {},{}",
            request.blueprint,
            request.level,
            request.room,
            origin.0,
            origin.1
        );
        Ok(Decision::accepted(inserts))
    }
}
