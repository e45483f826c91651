//! Verbindungs-Lebenszyklus
//!
//! Jede TCP-Verbindung durchlaeuft die Zustaende
//! `Verbunden -> Authentifizierung -> Aktiv -> Beendet`. Die erste Nachricht
//! muss eine Anmeldung sein; schlaegt sie fehl oder bleibt sie aus, wird die
//! Verbindung nach einem Auth-Fehler geschlossen, ohne je registriert zu sein.
//!
//! Ungueltige Frames im aktiven Zustand werden einzeln verworfen, die
//! Verbindung laeuft weiter. Nur Socket-Fehler, das Schliessen durch den
//! Client, Verdraengung durch eine Neuanmeldung oder der Shutdown beenden
//! die Schleife. Der Cleanup (Versuche abraeumen, Register-Eintrag, Praesenz
//! offline) laeuft auf jedem Austrittspfad.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pairlink_core::types::UserId;
use pairlink_db::models::{BenutzerRecord, PraesenzStatus};
use pairlink_db::repository::{AnrufRepository, BenutzerRepository};
use pairlink_protocol::signal::{AuthFehler, ClientEreignis, LoginOk, ServerEreignis};
use pairlink_protocol::wire::FrameCodec;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;

use crate::error::{SignalingError, SignalingResult};
use crate::relay;
use crate::server_state::RelayZustand;

/// Zustand einer Client-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// TCP steht, noch keine Nachricht
    Verbunden,
    /// Anmeldung laeuft
    Authentifizierung,
    /// Angemeldet und im Register erreichbar
    Aktiv,
    /// Abgebaut, Cleanup gelaufen
    Beendet,
}

/// Eine Client-Verbindung vom Accept bis zum Cleanup
pub struct ClientVerbindung<U: BenutzerRepository, A: AnrufRepository> {
    state: Arc<RelayZustand<U, A>>,
    peer_addr: SocketAddr,
    zustand: VerbindungsZustand,
}

impl<U: BenutzerRepository, A: AnrufRepository> ClientVerbindung<U, A> {
    pub fn neu(state: Arc<RelayZustand<U, A>>, peer_addr: SocketAddr) -> Self {
        Self {
            state,
            peer_addr,
            zustand: VerbindungsZustand::Verbunden,
        }
    }

    /// Treibt die Verbindung bis zu ihrem Ende
    ///
    /// Generisch ueber den Stream, damit Tests mit `tokio::io::duplex`
    /// ohne echten Socket laufen.
    pub async fn verarbeiten<S>(
        mut self,
        stream: S,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> SignalingResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut frames = Framed::new(stream, FrameCodec::new());

        // -- Handshake ------------------------------------------------------
        self.zustand = VerbindungsZustand::Authentifizierung;
        let benutzer = match self.handshake(&mut frames).await {
            Ok(benutzer) => benutzer,
            Err(e) => {
                tracing::info!(peer = %self.peer_addr, fehler = %e, "Handshake fehlgeschlagen");
                let _ = frames
                    .send(ServerEreignis::AuthError(AuthFehler {
                        message: "Authentication error".into(),
                    }))
                    .await;
                self.zustand = VerbindungsZustand::Beendet;
                return Ok(());
            }
        };

        let user_id = UserId::from(benutzer.id);
        let (sende_rx, verbindungs_nr) = self
            .state
            .register
            .registrieren(user_id, benutzer.username.clone());

        if let Err(e) = self
            .state
            .benutzer_repo
            .praesenz_setzen(user_id.inner(), PraesenzStatus::Online)
            .await
        {
            tracing::error!(user_id = %user_id, fehler = %e, "Praesenz online nicht setzbar");
        }

        if let Err(e) = frames
            .send(ServerEreignis::LoginOk(LoginOk {
                user_id,
                username: benutzer.username.clone(),
            }))
            .await
        {
            tracing::warn!(peer = %self.peer_addr, fehler = %e, "LoginOk nicht zustellbar");
        } else {
            self.zustand = VerbindungsZustand::Aktiv;
            tracing::info!(
                peer = %self.peer_addr,
                user_id = %user_id,
                username = %benutzer.username,
                "Benutzer angemeldet"
            );
            self.aktive_schleife(&mut frames, &benutzer, sende_rx, &mut shutdown_rx)
                .await;
        }

        // -- Cleanup, laeuft auf jedem Austrittspfad ------------------------
        if self.state.register.entfernen_wenn(&user_id, verbindungs_nr) {
            // Nur die aktuelle Registrierung raeumt Versuche und Praesenz ab;
            // eine verdraengte Verbindung wuerde sonst Anrufversuche loeschen,
            // die ihre Nachfolgerin gerade angelegt hat, und sie faelschlich
            // als abwesend erscheinen lassen.
            relay::versuche_abraeumen(&self.state, user_id);
            if let Err(e) = self
                .state
                .benutzer_repo
                .praesenz_setzen(user_id.inner(), PraesenzStatus::Offline)
                .await
            {
                tracing::error!(user_id = %user_id, fehler = %e, "Praesenz offline nicht setzbar");
            }
        }
        self.zustand = VerbindungsZustand::Beendet;
        tracing::info!(peer = %self.peer_addr, user_id = %user_id, "Verbindung beendet");
        Ok(())
    }

    /// Wartet auf die Anmeldung und prueft sie gegen den Auth-Service
    async fn handshake<S>(
        &self,
        frames: &mut Framed<S, FrameCodec>,
    ) -> SignalingResult<BenutzerRecord>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let timeout = Duration::from_secs(self.state.config.handshake_timeout_sek);
        let frame = tokio::time::timeout(timeout, frames.next())
            .await
            .map_err(|_| SignalingError::protokoll("Handshake-Timeout"))?
            .ok_or(SignalingError::VerbindungGetrennt)?
            .map_err(SignalingError::Io)?;

        let token = match serde_json::from_slice::<ClientEreignis>(&frame) {
            Ok(ClientEreignis::Login(req)) => req.token,
            Ok(_) => {
                return Err(SignalingError::protokoll(
                    "Erste Nachricht muss eine Anmeldung sein",
                ))
            }
            Err(e) => return Err(SignalingError::protokoll(format!("Ungueltiges Frame: {e}"))),
        };

        let benutzer = self
            .state
            .auth_service
            .verbindung_authentifizieren(Some(&token))
            .await?;
        Ok(benutzer)
    }

    /// Hauptschleife der aktiven Verbindung
    async fn aktive_schleife<S>(
        &self,
        frames: &mut Framed<S, FrameCodec>,
        benutzer: &BenutzerRecord,
        mut sende_rx: mpsc::Receiver<ServerEreignis>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let user_id = UserId::from(benutzer.id);
        loop {
            tokio::select! {
                eingehend = frames.next() => match eingehend {
                    Some(Ok(bytes)) => {
                        let ereignis = match serde_json::from_slice::<ClientEreignis>(&bytes) {
                            Ok(ereignis) => ereignis,
                            Err(e) => {
                                tracing::warn!(user_id = %user_id, fehler = %e,
                                    "Ungueltige Nachricht verworfen");
                                continue;
                            }
                        };
                        self.ereignis_verarbeiten(ereignis, user_id, &benutzer.username).await;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(user_id = %user_id, fehler = %e,
                            "Frame-Fehler, Verbindung wird geschlossen");
                        break;
                    }
                    None => {
                        tracing::debug!(user_id = %user_id, "Client hat die Verbindung geschlossen");
                        break;
                    }
                },
                ausgehend = sende_rx.recv() => match ausgehend {
                    Some(ereignis) => {
                        if let Err(e) = frames.send(ereignis).await {
                            tracing::warn!(user_id = %user_id, fehler = %e,
                                "Zustellung fehlgeschlagen, Verbindung wird geschlossen");
                            break;
                        }
                    }
                    // Register-Eintrag wurde ueberschrieben: eine neue
                    // Verbindung desselben Benutzers hat uebernommen
                    None => {
                        tracing::info!(user_id = %user_id,
                            "Verbindung durch Neuanmeldung verdraengt");
                        break;
                    }
                },
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!(user_id = %user_id, "Shutdown, Verbindung wird geschlossen");
                        break;
                    }
                }
            }
        }
    }

    async fn ereignis_verarbeiten(&self, ereignis: ClientEreignis, user_id: UserId, username: &str) {
        match ereignis {
            ClientEreignis::Login(_) => {
                tracing::warn!(user_id = %user_id, "Doppelte Anmeldung ignoriert");
            }
            ClientEreignis::FindPeer => relay::partner_suchen(&self.state, user_id).await,
            ClientEreignis::InitiateCall(req) => {
                relay::anruf_einleiten(&self.state, user_id, username, req).await;
            }
            ClientEreignis::AcceptCall(req) => {
                relay::anruf_annehmen(&self.state, user_id, req).await;
            }
            ClientEreignis::RejectCall(req) => {
                relay::anruf_ablehnen(&self.state, user_id, req).await;
            }
            ClientEreignis::EndCall(req) => {
                relay::anruf_beenden(&self.state, user_id, req).await;
            }
            ClientEreignis::IceCandidate(req) => {
                relay::ice_weiterleiten(&self.state, user_id, req);
            }
        }
    }

    /// Aktueller Zustand der Verbindung
    pub fn zustand(&self) -> VerbindungsZustand {
        self.zustand
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;
    use pairlink_auth::service::AuthService;
    use pairlink_auth::token::TokenStore;
    use pairlink_db::memory::{MemoryAnrufRepository, MemoryBenutzerRepository};
    use pairlink_db::models::Geschlecht;
    use pairlink_protocol::signal::LoginRequest;
    use tokio::io::DuplexStream;
    use uuid::Uuid;

    use crate::server_state::RelayConfig;

    type TestZustand = RelayZustand<MemoryBenutzerRepository, MemoryAnrufRepository>;

    struct TestUmgebung {
        state: Arc<TestZustand>,
        benutzer_repo: Arc<MemoryBenutzerRepository>,
        token_store: Arc<TokenStore>,
    }

    fn umgebung() -> TestUmgebung {
        let benutzer_repo = Arc::new(MemoryBenutzerRepository::neu());
        let token_store = TokenStore::neu();
        let auth = Arc::new(AuthService::neu(token_store.clone(), benutzer_repo.clone()));
        let state = RelayZustand::neu(
            RelayConfig::default(),
            auth,
            benutzer_repo.clone(),
            Arc::new(MemoryAnrufRepository::neu()),
        );
        TestUmgebung {
            state,
            benutzer_repo,
            token_store,
        }
    }

    /// Legt ein verifiziertes Konto an und stellt ein Token dafuer aus
    async fn konto_mit_token(u: &TestUmgebung, name: &str) -> (Uuid, String) {
        let id = Uuid::new_v4();
        u.benutzer_repo
            .einfuegen(BenutzerRecord {
                id,
                username: name.into(),
                geschlecht: Geschlecht::Other,
                is_verified: true,
                status: PraesenzStatus::Offline,
                created_at: Utc::now(),
            })
            .await;
        let token = u.token_store.ausstellen(id).await.unwrap();
        (id, token.token)
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:9999".parse().unwrap()
    }

    async fn empfangen(frames: &mut Framed<DuplexStream, FrameCodec>) -> ServerEreignis {
        let bytes = frames.next().await.expect("Stream offen").expect("Frame ok");
        serde_json::from_slice(&bytes).expect("ServerEreignis")
    }

    #[tokio::test]
    async fn ungueltiges_token_wird_abgewiesen() {
        let u = umgebung();
        let (server_seite, client_seite) = tokio::io::duplex(4096);
        let (_tx, shutdown_rx) = watch::channel(false);

        let verbindung = ClientVerbindung::neu(u.state.clone(), peer());
        let server = verbindung.verarbeiten(server_seite, shutdown_rx);

        let client = async {
            let mut frames = Framed::new(client_seite, FrameCodec::new());
            frames
                .send(ClientEreignis::Login(LoginRequest {
                    token: "quatsch".into(),
                }))
                .await
                .unwrap();
            match empfangen(&mut frames).await {
                ServerEreignis::AuthError(f) => assert_eq!(f.message, "Authentication error"),
                andere => panic!("AuthError erwartet, bekam {andere:?}"),
            }
        };

        let (ergebnis, ()) = tokio::join!(server, client);
        ergebnis.unwrap();
        assert_eq!(u.state.register.anzahl(), 0);
    }

    #[tokio::test]
    async fn erste_nachricht_muss_login_sein() {
        let u = umgebung();
        let (server_seite, client_seite) = tokio::io::duplex(4096);
        let (_tx, shutdown_rx) = watch::channel(false);

        let server = ClientVerbindung::neu(u.state.clone(), peer())
            .verarbeiten(server_seite, shutdown_rx);
        let client = async {
            let mut frames = Framed::new(client_seite, FrameCodec::new());
            frames.send(ClientEreignis::FindPeer).await.unwrap();
            assert!(matches!(
                empfangen(&mut frames).await,
                ServerEreignis::AuthError(_)
            ));
        };

        let (ergebnis, ()) = tokio::join!(server, client);
        ergebnis.unwrap();
    }

    #[tokio::test]
    async fn anmeldung_setzt_praesenz_und_registriert() {
        let u = umgebung();
        let (id, token) = konto_mit_token(&u, "anna").await;
        let (server_seite, client_seite) = tokio::io::duplex(4096);
        let (_tx, shutdown_rx) = watch::channel(false);

        let server = ClientVerbindung::neu(u.state.clone(), peer())
            .verarbeiten(server_seite, shutdown_rx);
        let state = u.state.clone();
        let benutzer_repo = u.benutzer_repo.clone();
        let client = async move {
            let mut frames = Framed::new(client_seite, FrameCodec::new());
            frames
                .send(ClientEreignis::Login(LoginRequest { token }))
                .await
                .unwrap();
            match empfangen(&mut frames).await {
                ServerEreignis::LoginOk(ok) => {
                    assert_eq!(ok.user_id, UserId::from(id));
                    assert_eq!(ok.username, "anna");
                }
                andere => panic!("LoginOk erwartet, bekam {andere:?}"),
            }

            // Waehrend die Verbindung steht: registriert und online
            assert!(state.register.ist_registriert(&UserId::from(id)));
            let konto = benutzer_repo.get_by_id(id).await.unwrap().unwrap();
            assert_eq!(konto.status, PraesenzStatus::Online);

            drop(frames); // Client trennt
        };

        let (ergebnis, ()) = tokio::join!(server, client);
        ergebnis.unwrap();

        // Nach der Trennung: ausgetragen und offline
        assert!(!u.state.register.ist_registriert(&UserId::from(id)));
        let konto = u.benutzer_repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(konto.status, PraesenzStatus::Offline);
    }

    #[tokio::test]
    async fn ungueltige_nachricht_beendet_verbindung_nicht() {
        let u = umgebung();
        let (_id, token) = konto_mit_token(&u, "anna").await;
        let (server_seite, client_seite) = tokio::io::duplex(4096);
        let (_tx, shutdown_rx) = watch::channel(false);

        let server = ClientVerbindung::neu(u.state.clone(), peer())
            .verarbeiten(server_seite, shutdown_rx);
        let client = async move {
            let mut frames = Framed::new(client_seite, FrameCodec::new());
            frames
                .send(ClientEreignis::Login(LoginRequest { token }))
                .await
                .unwrap();
            assert!(matches!(
                empfangen(&mut frames).await,
                ServerEreignis::LoginOk(_)
            ));

            // Gueltig gerahmter Muell wird verworfen, die Verbindung lebt
            frames
                .send(Bytes::from_static(b"kein json"))
                .await
                .unwrap();
            frames.send(ClientEreignis::FindPeer).await.unwrap();
            assert!(matches!(
                empfangen(&mut frames).await,
                ServerEreignis::NoPeer { .. }
            ));

            drop(frames);
        };

        let (ergebnis, ()) = tokio::join!(server, client);
        ergebnis.unwrap();
    }

    #[tokio::test]
    async fn neuanmeldung_verdraengt_alte_verbindung() {
        let u = umgebung();
        let (id, token) = konto_mit_token(&u, "anna").await;
        let (server_seite, client_seite) = tokio::io::duplex(4096);
        let (_tx, shutdown_rx) = watch::channel(false);

        let server = ClientVerbindung::neu(u.state.clone(), peer())
            .verarbeiten(server_seite, shutdown_rx);
        let state = u.state.clone();
        let benutzer_repo = u.benutzer_repo.clone();
        let client = async move {
            let mut frames = Framed::new(client_seite, FrameCodec::new());
            frames
                .send(ClientEreignis::Login(LoginRequest { token }))
                .await
                .unwrap();
            assert!(matches!(
                empfangen(&mut frames).await,
                ServerEreignis::LoginOk(_)
            ));

            // Zweite Anmeldung desselben Benutzers uebernimmt den Eintrag
            let (_rx_neu, _nr) = state
                .register
                .registrieren(UserId::from(id), "anna".into());

            // Die alte Verbindung beendet sich, sobald ihre Queue weg ist;
            // der Stream endet aus Client-Sicht.
            assert!(frames.next().await.is_none());

            // Der neue Eintrag bleibt bestehen, Praesenz bleibt online
            assert!(state.register.ist_registriert(&UserId::from(id)));
            let konto = benutzer_repo.get_by_id(id).await.unwrap().unwrap();
            assert_eq!(konto.status, PraesenzStatus::Online);
        };

        let (ergebnis, ()) = tokio::join!(server, client);
        ergebnis.unwrap();
    }

    #[tokio::test]
    async fn verdraengung_loescht_versuche_der_neuanmeldung_nicht() {
        let u = umgebung();
        let (id, token) = konto_mit_token(&u, "anna").await;
        let (server_seite, client_seite) = tokio::io::duplex(4096);
        let (_tx, shutdown_rx) = watch::channel(false);

        let server = ClientVerbindung::neu(u.state.clone(), peer())
            .verarbeiten(server_seite, shutdown_rx);
        let state = u.state.clone();
        let client = async move {
            let mut frames = Framed::new(client_seite, FrameCodec::new());
            frames
                .send(ClientEreignis::Login(LoginRequest { token }))
                .await
                .unwrap();
            assert!(matches!(
                empfangen(&mut frames).await,
                ServerEreignis::LoginOk(_)
            ));

            // Neuanmeldung uebernimmt den Eintrag und leitet sofort einen
            // Anruf ein
            let (_rx_neu, _nr) = state
                .register
                .registrieren(UserId::from(id), "anna".into());
            state.versuche.einleiten(UserId::from(id), UserId::new());

            // Die verdraengte Verbindung baut ab
            assert!(frames.next().await.is_none());

            // Ihr Teardown darf den Versuch der Neuanmeldung nicht abraeumen
            assert_eq!(state.versuche.anzahl(), 1);
        };

        let (ergebnis, ()) = tokio::join!(server, client);
        ergebnis.unwrap();
    }

    #[tokio::test]
    async fn geschlossener_shutdown_kanal_beendet_verbindung_nicht() {
        let u = umgebung();
        let (_id, token) = konto_mit_token(&u, "anna").await;
        let (server_seite, client_seite) = tokio::io::duplex(4096);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let server = ClientVerbindung::neu(u.state.clone(), peer())
            .verarbeiten(server_seite, shutdown_rx);
        let client = async move {
            let mut frames = Framed::new(client_seite, FrameCodec::new());
            frames
                .send(ClientEreignis::Login(LoginRequest { token }))
                .await
                .unwrap();
            assert!(matches!(
                empfangen(&mut frames).await,
                ServerEreignis::LoginOk(_)
            ));

            // Sender weg ohne Signal: die Verbindung muss weiterarbeiten
            drop(shutdown_tx);
            frames.send(ClientEreignis::FindPeer).await.unwrap();
            assert!(matches!(
                empfangen(&mut frames).await,
                ServerEreignis::NoPeer { .. }
            ));

            drop(frames);
        };

        let (ergebnis, ()) = tokio::join!(server, client);
        ergebnis.unwrap();
    }

    #[tokio::test]
    async fn shutdown_beendet_aktive_verbindung() {
        let u = umgebung();
        let (_id, token) = konto_mit_token(&u, "anna").await;
        let (server_seite, client_seite) = tokio::io::duplex(4096);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let server = ClientVerbindung::neu(u.state.clone(), peer())
            .verarbeiten(server_seite, shutdown_rx);
        let client = async move {
            let mut frames = Framed::new(client_seite, FrameCodec::new());
            frames
                .send(ClientEreignis::Login(LoginRequest { token }))
                .await
                .unwrap();
            assert!(matches!(
                empfangen(&mut frames).await,
                ServerEreignis::LoginOk(_)
            ));

            shutdown_tx.send(true).unwrap();
            // Server baut ab, der Stream endet
            assert!(frames.next().await.is_none());
        };

        let (ergebnis, ()) = tokio::join!(server, client);
        ergebnis.unwrap();
        assert_eq!(u.state.register.anzahl(), 0);
    }
}
