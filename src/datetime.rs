use chrono::{DateTime, NaiveDate, Utc};

#[cfg(not(test))]
/// 現在のUTC時刻を取得する。
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// テスト時に時計を固定・進めるためのモック。
///
/// スレッドローカルに保持するため、`#[tokio::test]`のcurrent_threadランタイム上で
/// spawnされたタスクからも同じ時刻が見える。
#[cfg(test)]
pub mod mock_datetime {
    use std::cell::RefCell;

    use chrono::Duration;

    use super::DateTime;
    use super::Utc;

    thread_local! {
        static MOCK_TIME: RefCell<Option<DateTime<Utc>>> = RefCell::new(None);
    }

    /// モック時刻を取得する。未設定なら実時刻を返す。
    pub fn now() -> DateTime<Utc> {
        MOCK_TIME.with(|cell| cell.borrow().as_ref().cloned().unwrap_or_else(Utc::now))
    }

    /// モック時刻を設定する。
    pub fn set_mock_time(time: DateTime<Utc>) {
        MOCK_TIME.with(|cell| *cell.borrow_mut() = Some(time));
    }

    /// モック時刻を指定秒だけ進める。
    pub fn advance_seconds(seconds: i64) {
        let next = now() + Duration::seconds(seconds);
        set_mock_time(next);
    }

    // 設定したモック時刻をクリアする。
    pub fn clear_mock_time() {
        MOCK_TIME.with(|cell| *cell.borrow_mut() = None);
    }
}

#[cfg(test)]
pub use mock_datetime::now;

/// 今日の日付を取得する。
///
/// タイマーから作成するエントリーの日付に利用する。日付はUTCで決まる。
pub fn today() -> NaiveDate {
    now().date_naive()
}

/// `since`から現在までの経過秒数を返す。未来の時刻なら0とする。
pub fn seconds_since(since: DateTime<Utc>) -> i64 {
    (now() - since).num_seconds().max(0)
}
