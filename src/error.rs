use trackable::error::TrackableError;
use trackable::error::{ErrorKind as TrackableErrorKind, ErrorKindExt};

/// クレート固有の`Error`型.
#[derive(Debug, Clone, TrackableError)]
pub struct Error(TrackableError<ErrorKind>);
impl From<std::io::Error> for Error {
    fn from(f: std::io::Error) -> Self {
        ErrorKind::Other.cause(f).into()
    }
}
impl From<prometrics::Error> for Error {
    fn from(f: prometrics::Error) -> Self {
        ErrorKind::Other.cause(f).into()
    }
}

/// 発生し得るエラーの種類.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 候補マシンに紐付かない投票メンバが、レプリカセット内に存在している.
    ///
    /// 投票メンバを非投票に降格させる前に、マシンを候補集合から
    /// 外してしまった場合に発生する.
    /// 勝手に投票権を剥奪すると、プライマリを巻き込んで
    /// クォーラムを失う危険があるため、その調停周期は構成を
    /// 変更せずに中断される.
    ///
    /// このエラーを受け取った場合、利用者は当該メンバのマシンを
    /// 候補に戻すか、レプリカセット側で明示的に降格させることで、
    /// 次の周期から調停を再開させることができる.
    ExtraVotingMember,

    /// 入力が不正.
    ///
    /// このエラーを受け取った場合、利用者は可能であれば、
    /// 入力値を適切なものに修正して、同様の操作をリトライすることが望ましい.
    InvalidInput,

    /// その他エラー.
    ///
    /// 主に`Io`トレイトの実装のために設けられたエラー区分.
    Other,
}
impl TrackableErrorKind for ErrorKind {}
