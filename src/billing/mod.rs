pub mod cost_sync_service;
