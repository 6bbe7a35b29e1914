//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use hoops_stats::{
    CsvSource, Engine, FetchError, IngestPipeline, MemorySource, SchemaRegistry, StatsDatabase,
    VirtualFileStore,
};

pub const PLAYER_DIRECTORY: &str = "\
player_id,player,hof,active,first_seas,last_seas
duncati01,Tim Duncan,True,False,1998,2016
jamesle01,LeBron James,False,True,2004,2025
rookiex01,Rookie Example,False,True,2025,2025
duncati01,Tim Duncan Duplicate,False,False,1998,2016
";

pub const PLAYER_BIO: &str = "\
player_id,position,height,weight,birthdate,school,draft_year,draft_round,draft_number
duncati01,C,6-11,250,1976-04-25T00:00:00,Wake Forest,1997,1,1
jamesle01,F,6-9,250,1984-12-30T00:00:00,St. Vincent-St. Mary HS (OH),2003,1,1
rookiex01,G,6-3,NA,N/A,,Undrafted,,
";

pub const PLAYER_PER_GAME: &str = "\
season,player_id,player,pos,age,lg,tm,g,gs,mp_per_game,trb_per_game,ast_per_game,pts_per_game
2004,jamesle01,LeBron James,SG,19,NBA,CLE,79,79,39.5,5.5,5.9,20.9
2004,duncati01,Tim Duncan,PF,27,NBA,SAS,69,68,36.6,12.4,3.1,22.3
2025,rookiex01,Rookie Example,PG,20,NBA,2TM,50,10,20.0,2.0,4.0,9.0
2025,rookiex01,Rookie Example,PG,20,NBA,BOS,20,4,18.0,2.0,3.0,8.0
2025,rookiex01,Rookie Example,PG,20,NBA,LAL,30,6,21.3,2.0,4.7,9.7
";

pub const ADVANCED: &str = "\
season,player_id,player,pos,age,lg,tm,g,mp,per,ws,ws_48,vorp
2004,jamesle01,LeBron James,SG,19,NBA,CLE,79,3122,18.3,5.1,0.078,2.6
2004,duncati01,Tim Duncan,PF,27,NBA,SAS,69,2527,27.1,15.5,0.294,7.1
";

pub const TEAM_SUMMARIES: &str = "\
season,lg,team,abbreviation,playoffs,w,l,w_l_percent,o_rtg,d_rtg,n_rtg,pace,srs
2004,NBA,Cleveland Cavaliers,CLE,False,35,47,0.427,101.3,103.7,-2.4,89.1,-2.3
2004,NBA,San Antonio Spurs,SAS,True,57,25,,101.8,91.6,10.2,88.3,7.5
2004,NBA,League Average,NA,,41,41,0.500,,,,,
2025,NBA,Boston Celtics,BOS,True,61,21,0.744,,,,,
2025,NBA,Boston Celtics Duplicate,BOS,False,1,81,0.012,,,,,
";

pub const DRAFT_HISTORY: &str = "\
Draft Year,Rnd,Rnd Pk,Pk,Tm,Player,player_id,College
2003,1,1,1,CLE,LeBron James,jamesle01,
2003,1,2,2,DET,Darko Milicic,milicda01,
1997,1,1,1,SAS,Tim Duncan,duncati01,Wake Forest
";

pub const GAMES: &str = "\
season_id,team_abbreviation_home,game_id,game_date,pts_home,team_abbreviation_away,pts_away,season_type
42004,SAS,0040300101,2004-04-17 00:00:00,91,MEM,72,Playoffs
22004,CLE,0020300001,2003-10-29 00:00:00,92,SAC,106,Regular Season
22004,CLE,0020300002,2003-10-30 00:00:00,100,PHX,95,
";

/// Every built-in dataset except `Team Abbrev.csv`
pub fn basketball_source() -> MemorySource {
    MemorySource::new()
        .with_file("Player Directory.csv", PLAYER_DIRECTORY)
        .with_file("common_player_info.csv", PLAYER_BIO)
        .with_file("Player Per Game.csv", PLAYER_PER_GAME)
        .with_file("Advanced.csv", ADVANCED)
        .with_file("Team Summaries.csv", TEAM_SUMMARIES)
        .with_file("draft_history.csv", DRAFT_HISTORY)
        .with_file("game.csv", GAMES)
}

/// Counts fetches and optionally delays each one
pub struct CountingSource<S> {
    inner: S,
    delay: Duration,
    fetches: AtomicUsize,
}

impl<S: CsvSource> CountingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            delay: Duration::ZERO,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: CsvSource> CsvSource for CountingSource<S> {
    async fn fetch(&self, file_name: &str) -> Result<String, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.fetch(file_name).await
    }

    fn describe(&self) -> String {
        format!("counting({})", self.inner.describe())
    }
}

/// Fails every fetch as a network error
pub struct UnreachableSource;

#[async_trait]
impl CsvSource for UnreachableSource {
    async fn fetch(&self, file_name: &str) -> Result<String, FetchError> {
        Err(FetchError::transient(file_name, "connection refused"))
    }

    fn describe(&self) -> String {
        "unreachable".to_string()
    }
}

pub fn pipeline_with(
    engine: Engine,
    source: Arc<dyn CsvSource>,
    registry: SchemaRegistry,
) -> IngestPipeline {
    IngestPipeline::new(
        Arc::new(engine),
        source,
        Arc::new(VirtualFileStore::temporary().expect("staging dir")),
        Arc::new(registry),
    )
}

pub fn in_memory_pipeline(source: Arc<dyn CsvSource>) -> IngestPipeline {
    pipeline_with(
        Engine::in_memory().expect("in-memory engine"),
        source,
        SchemaRegistry::basketball(),
    )
}

pub fn in_memory_database(source: Arc<dyn CsvSource>) -> StatsDatabase {
    StatsDatabase::new(in_memory_pipeline(source))
}
