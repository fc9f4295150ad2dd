use super::*;

/// Energy preloaded into a freshly placed spawn.
const SPAWN_STARTING_ENERGY: i64 = 300;

const SPAWN_HITS: i64 = 5_000;

/// Safe-mode window granted when a spawn claims an unowned controller.
const SAFE_MODE_GRACE_TICKS: u64 = 20_000;

impl RulesEngine {
    /// Place a user's first spawn in a room.
    ///
    /// The spawn site check is stricter than ordinary construction: the tile
    /// must be empty, and the room must hold a controller that is neither
    /// owned nor reserved by anyone else. Claiming an unowned controller and
    /// inserting the spawn happen in one mutation.
    pub fn place_spawn(
        &mut self,
        request: &SpawnRequest,
    ) -> Result<Decision<RoomObject>, EngineError> {
        let slice = self.room_slice(&request.room, request.shard.as_deref())?;
        if let Err(reason) = check_spawn_site(
            &request.user,
            request.x,
            request.y,
            slice.terrain.as_ref(),
            &slice.objects,
        ) {
            return Ok(Decision::rejected(reason));
        }

        let now = self.store.game_time()?;
        let id = self.allocate_id("spawn")?;
        let mut spawn = RoomObject::new(
            id,
            ObjectKind::Spawn,
            request.shard.clone(),
            &request.room,
            request.x,
            request.y,
        );
        spawn.user = Some(request.user.clone());
        spawn.name = Some(
            request
                .name
                .clone()
                .unwrap_or_else(|| "Spawn1".to_string()),
        );
        spawn.hits = Some(SPAWN_HITS);
        spawn.hits_max = Some(SPAWN_HITS);
        spawn.store.insert("energy".to_string(), SPAWN_STARTING_ENERGY);

        let mut mutation = WorldMutation {
            inserts: vec![spawn.clone()],
            ..WorldMutation::default()
        };

        let controller = slice
            .objects
            .iter()
            .find(|object| object.kind == ObjectKind::Controller);
        if let Some(controller) = controller {
            if controller.user.is_none() {
                let mut claimed = controller.clone();
                claimed.user = Some(request.user.clone());
                claimed.level = Some(1);
                claimed.progress = Some(0);
                claimed.reservation = None;
                claimed.safe_mode = Some(now + SAFE_MODE_GRACE_TICKS);
                mutation.updates.push(claimed);
            }
        }

        self.store.apply(mutation)?;
        log::info!(
            "spawn {} placed for {} in {}",
            spawn.id,
            request.user,
            request.room
        );
        Ok(Decision::accepted(spawn))
    }
}
